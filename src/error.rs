//! Error types for Solidafy Extract
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Invalid checkpoints are not errors: the partition factory reports them as
//! [`crate::shared::ValidationFailure`] values and falls back to a cold start.

use thiserror::Error;

/// The main error type for Solidafy Extract
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Catalog Errors
    // ============================================================================
    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    #[error("Field '{field}' not found in stream '{stream}'")]
    FieldNotFound { stream: String, field: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Invalid state value for stream '{stream}': {message}")]
    InvalidStateValue { stream: String, message: String },

    // ============================================================================
    // Codec Errors
    // ============================================================================
    #[error("Cannot decode {field_type} value {value}: {message}")]
    Codec {
        field_type: String,
        value: String,
        message: String,
    },

    // ============================================================================
    // Query Errors
    // ============================================================================
    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    // ============================================================================
    // Partition Errors
    // ============================================================================
    #[error("Partition error for stream '{stream}': {message}")]
    Partition { stream: String, message: String },

    #[error("Resources unavailable: {message}")]
    ResourcesUnavailable { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a field not found error
    pub fn field_not_found(stream: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            stream: stream.into(),
            field: field.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an invalid state value error
    pub fn invalid_state(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStateValue {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a codec error
    pub fn codec(
        field_type: impl ToString,
        value: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Codec {
            field_type: field_type.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a partition error
    pub fn partition(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Partition {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a resources unavailable error
    pub fn resources_unavailable(message: impl Into<String>) -> Self {
        Self::ResourcesUnavailable {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Query failures are fatal for the stream; only resource exhaustion is
    /// worth rescheduling.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ResourcesUnavailable { .. })
    }
}

/// Result type alias for Solidafy Extract
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
