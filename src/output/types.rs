//! Output types
//!
//! Message types and the sink trait.

use crate::catalog::StreamIdentifier;
use crate::types::{JsonObject, JsonValue, LogLevel};
use serde::Serialize;

/// One row read from a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub stream: StreamIdentifier,
    pub data: JsonObject,
}

/// What the sink did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDisposition {
    Emitted,
    Discarded,
}

/// A message emitted during sync
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// A single record
    Record {
        /// Stream label
        stream: String,
        /// Row data
        data: JsonObject,
    },
    /// Checkpoint
    State {
        /// Stream label
        stream: String,
        /// Opaque state value
        data: JsonValue,
    },
    /// Previously emitted data of the stream is invalid
    StreamReset {
        /// Stream label
        stream: String,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

impl Message {
    /// Create a record message
    pub fn record(record: StreamRecord) -> Self {
        Self::Record {
            stream: record.stream.to_string(),
            data: record.data,
        }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: JsonValue) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a stream reset message
    pub fn stream_reset(stream: impl Into<String>) -> Self {
        Self::StreamReset {
            stream: stream.into(),
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a warning log
    pub fn warn(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Warn, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a stream reset message
    pub fn is_stream_reset(&self) -> bool {
        matches!(self, Self::StreamReset { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Destination of records and messages
///
/// Calls must not block; implementations buffer internally.
pub trait OutputConsumer: Send + Sync {
    /// Hand over one record
    fn accept(&self, record: StreamRecord) -> RecordDisposition;

    /// Hand over a state, reset or log message
    fn accept_message(&self, message: Message);
}
