//! Common types used throughout Solidafy Extract
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Sync Mode
// ============================================================================

/// Synchronization mode for streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full refresh - read the whole table every time
    #[default]
    FullRefresh,
    /// Incremental - read rows past the last cursor value
    Incremental,
}

// ============================================================================
// Log Level
// ============================================================================

/// Log level for emitted log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_mode_serde() {
        let mode: SyncMode = serde_json::from_str("\"incremental\"").unwrap();
        assert_eq!(mode, SyncMode::Incremental);
        assert_eq!(
            serde_json::to_string(&SyncMode::FullRefresh).unwrap(),
            "\"full_refresh\""
        );
        assert_eq!(SyncMode::default(), SyncMode::FullRefresh);
    }

    #[test]
    fn test_log_level_serde() {
        assert_eq!(
            serde_json::to_string(&LogLevel::Info).unwrap(),
            "\"INFO\""
        );
        let level: LogLevel = serde_json::from_str("\"WARN\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
    }
}
