//! State types for tracking sync progress
//!
//! `CheckpointState` is the document behind every `OpaqueStateValue`;
//! `State` is what gets persisted between runs.

use crate::error::Result;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized checkpoint of one stream
pub type OpaqueStateValue = JsonValue;

// ============================================================================
// Checkpoint Document
// ============================================================================

/// `{"pk": {<col>: <value>, ..}, "cursor": {<cursor field>: <value>}}`
///
/// Both keys are optional. `{}` marks a finished snapshot of a stream that
/// has no cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Last primary key tuple read by the snapshot phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<JsonObject>,

    /// Single-entry map from cursor field to cursor value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<JsonObject>,
}

impl CheckpointState {
    /// Parse an opaque value; anything but a JSON object fails
    pub fn parse(value: &OpaqueStateValue) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Serialize back into an opaque value
    pub fn into_value(self) -> OpaqueStateValue {
        let mut object = JsonObject::new();
        if let Some(pk) = self.pk {
            object.insert("pk".to_string(), JsonValue::Object(pk));
        }
        if let Some(cursor) = self.cursor {
            object.insert("cursor".to_string(), JsonValue::Object(cursor));
        }
        JsonValue::Object(object)
    }

    /// Snapshot finished, nothing left to read
    pub fn snapshot_completed() -> OpaqueStateValue {
        Self::default().into_value()
    }

    /// Snapshot interrupted after the key tuple `pk`
    pub fn snapshot(pk: JsonObject) -> OpaqueStateValue {
        Self {
            pk: Some(pk),
            cursor: None,
        }
        .into_value()
    }

    /// Snapshot of an incremental stream interrupted after `pk`; the cursor
    /// is the upper bound the incremental phase will start from
    pub fn snapshot_with_cursor(
        pk: JsonObject,
        cursor_field: &str,
        cursor_value: JsonValue,
    ) -> OpaqueStateValue {
        Self {
            pk: Some(pk),
            cursor: Some(single_entry(cursor_field, cursor_value)),
        }
        .into_value()
    }

    /// Incremental phase reached `cursor_value`
    pub fn cursor_incremental(cursor_field: &str, cursor_value: JsonValue) -> OpaqueStateValue {
        Self {
            pk: None,
            cursor: Some(single_entry(cursor_field, cursor_value)),
        }
        .into_value()
    }
}

fn single_entry(key: &str, value: JsonValue) -> JsonObject {
    let mut object = JsonObject::new();
    object.insert(key.to_string(), value);
    object
}

// ============================================================================
// Persisted State
// ============================================================================

/// Complete persisted state of a sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream checkpoints keyed by stream label
    #[serde(default)]
    pub streams: BTreeMap<String, StreamCheckpoint>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Last checkpoint of a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamCheckpoint> {
        self.streams.get(stream)
    }

    /// Record a checkpoint, accumulating the record count
    pub fn set_checkpoint(&mut self, stream: &str, state: OpaqueStateValue, records: u64) {
        let entry = self.streams.entry(stream.to_string()).or_default();
        entry.state = state;
        entry.records += records;
        entry.updated_at = Some(Utc::now());
    }
}

/// Last persisted checkpoint of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamCheckpoint {
    /// Opaque checkpoint value
    #[serde(default)]
    pub state: OpaqueStateValue,

    /// Records emitted since the state was last cleared
    #[serde(default)]
    pub records: u64,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
