//! State management module
//!
//! Handles checkpoint documents, per-stream runtime state and persistence.
//! State is persisted between sync runs so an interrupted sync resumes
//! exactly where it left off.
//!
//! # Overview
//!
//! The state module provides:
//! - `CheckpointState` - The `pk` / `cursor` document behind an `OpaqueStateValue`
//! - `StreamState` - Cursor upper bound, fetch size and read limit of one stream
//! - `LimitState` - Adaptive row limit of resumable reads
//! - `StateManager` - File-based state persistence

mod manager;
mod stream_state;
mod types;

pub use manager::StateManager;
pub use stream_state::{LimitState, StreamState};
pub use types::{CheckpointState, OpaqueStateValue, State, StreamCheckpoint};
