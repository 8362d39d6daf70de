//! Catalog types
//!
//! Streams are validated once at construction and never mutated afterwards.

use crate::error::{Error, Result};
use crate::types::SyncMode;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Stream Identifier
// ============================================================================

/// Namespace-qualified stream name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamIdentifier {
    /// Schema or database namespace, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Table name
    pub name: String,
}

impl StreamIdentifier {
    /// Create an identifier without namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Create a namespaced identifier
    pub fn with_namespace(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for StreamIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Value type of a field, selects the checkpoint codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Boolean,
    Integer,
    Number,
    Decimal,
    #[default]
    String,
    Date,
    Time,
    TimestampWithoutTimezone,
    TimestampWithTimezone,
    Binary,
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Decimal => "decimal",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::TimestampWithoutTimezone => "timestamp_without_timezone",
            FieldType::TimestampWithTimezone => "timestamp_with_timezone",
            FieldType::Binary => "binary",
            FieldType::Json => "json",
        };
        f.write_str(name)
    }
}

/// A column of a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name
    #[serde(rename = "name")]
    pub id: String,
    /// Column type
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
        }
    }
}

// ============================================================================
// Stream Definition (job file)
// ============================================================================

/// Stream entry as it appears in a job file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDefinition {
    /// Table name
    pub name: String,

    /// Schema / namespace
    #[serde(default)]
    pub namespace: Option<String>,

    /// Ordered columns to extract
    #[serde(default)]
    pub fields: Vec<Field>,

    /// Full refresh or incremental
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Primary key column names, in key order
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Cursor column name (required for incremental streams)
    #[serde(default)]
    pub cursor_field: Option<String>,
}

// ============================================================================
// Stream
// ============================================================================

/// A validated stream
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    id: StreamIdentifier,
    fields: Vec<Field>,
    sync_mode: SyncMode,
    primary_key: Vec<Field>,
    cursor: Option<Field>,
}

impl Stream {
    /// Build a stream, resolving primary key and cursor against `fields`
    ///
    /// The cursor is only retained for incremental streams. An incremental
    /// stream without a cursor is rejected.
    pub fn new(
        id: StreamIdentifier,
        fields: Vec<Field>,
        sync_mode: SyncMode,
        primary_key: &[String],
        cursor_field: Option<&str>,
    ) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::config(format!("Stream '{id}' has no fields")));
        }

        let lookup = |name: &str| -> Result<Field> {
            fields
                .iter()
                .find(|f| f.id == name)
                .cloned()
                .ok_or_else(|| Error::field_not_found(id.to_string(), name))
        };

        let primary_key = primary_key
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<Vec<_>>>()?;

        let cursor = match (sync_mode, cursor_field) {
            (SyncMode::Incremental, Some(name)) => Some(lookup(name)?),
            (SyncMode::Incremental, None) => {
                return Err(Error::config(format!(
                    "Incremental stream '{id}' requires a cursor field"
                )));
            }
            (SyncMode::FullRefresh, _) => None,
        };

        Ok(Self {
            id,
            fields,
            sync_mode,
            primary_key,
            cursor,
        })
    }

    /// Build a stream from its job file definition
    pub fn from_definition(def: &StreamDefinition) -> Result<Self> {
        let id = StreamIdentifier {
            namespace: def.namespace.clone(),
            name: def.name.clone(),
        };
        Self::new(
            id,
            def.fields.clone(),
            def.sync_mode,
            &def.primary_key,
            def.cursor_field.as_deref(),
        )
    }

    pub fn id(&self) -> &StreamIdentifier {
        &self.id
    }

    /// Human readable label used in logs and messages
    pub fn label(&self) -> String {
        self.id.to_string()
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    pub fn is_incremental(&self) -> bool {
        self.sync_mode == SyncMode::Incremental
    }

    /// Primary key fields in key order (empty when none is configured)
    pub fn primary_key(&self) -> &[Field] {
        &self.primary_key
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Cursor field of an incremental stream
    pub fn cursor(&self) -> Option<&Field> {
        self.cursor.as_ref()
    }

    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == name)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The streams of one sync, in configuration order
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    streams: Vec<Stream>,
}

impl Catalog {
    pub fn new(streams: Vec<Stream>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for stream in &streams {
            if !seen.insert(stream.id().clone()) {
                return Err(Error::config(format!(
                    "Duplicate stream '{}' in catalog",
                    stream.id()
                )));
            }
        }
        Ok(Self { streams })
    }

    /// Build a catalog from job file definitions
    pub fn from_definitions(defs: &[StreamDefinition]) -> Result<Self> {
        let streams = defs
            .iter()
            .map(Stream::from_definition)
            .collect::<Result<Vec<_>>>()?;
        Self::new(streams)
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn get(&self, id: &StreamIdentifier) -> Result<&Stream> {
        self.streams
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| Error::StreamNotFound {
                stream: id.to_string(),
            })
    }

    /// Keep only the streams named in `names` (by name or label)
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let mut streams = Vec::with_capacity(names.len());
        for name in names {
            let stream = self
                .streams
                .iter()
                .find(|s| s.name() == name || &s.label() == name)
                .ok_or_else(|| Error::StreamNotFound {
                    stream: name.clone(),
                })?;
            streams.push(stream.clone());
        }
        Self::new(streams)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
