//! State manager implementation
//!
//! Holds the last checkpoint of every stream and, when backed by a file,
//! rewrites that file atomically after each change.

use super::types::{OpaqueStateValue, State};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Checkpoint store shared by every stream of a sync
///
/// Clones share the same checkpoints.
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Backing file, `None` when in memory
    path: Option<PathBuf>,
    state: Arc<RwLock<State>>,
}

impl StateManager {
    fn with_state(path: Option<PathBuf>, state: State) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Empty state persisted to `path`, ignoring any existing content
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_state(Some(path.as_ref().to_path_buf()), State::new())
    }

    /// Empty state that is never written anywhere
    pub fn in_memory() -> Self {
        Self::with_state(None, State::new())
    }

    /// State persisted to `path`, starting from its content if the file exists
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            serde_json::from_str(&contents)
                .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
        } else {
            State::new()
        };
        tracing::debug!(path = %path.display(), streams = state.streams.len(), "Loaded state");
        Ok(Self::with_state(Some(path), state))
    }

    /// In-memory state starting from an inline JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::with_state(None, state))
    }

    /// Last checkpoint of a stream
    pub async fn get(&self, stream: &str) -> Option<OpaqueStateValue> {
        let state = self.state.read().await;
        state.get_stream(stream).map(|s| s.state.clone())
    }

    /// Records emitted for a stream since its state was last cleared
    pub async fn record_count(&self, stream: &str) -> u64 {
        let state = self.state.read().await;
        state.get_stream(stream).map_or(0, |s| s.records)
    }

    /// Labels of the streams holding a checkpoint
    pub async fn streams(&self) -> Vec<String> {
        self.state.read().await.streams.keys().cloned().collect()
    }

    /// Copy of the whole state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Record a checkpoint for a stream, adding `records` to its count
    pub async fn set(&self, stream: &str, value: OpaqueStateValue, records: u64) -> Result<()> {
        self.state
            .write()
            .await
            .set_checkpoint(stream, value, records);
        self.persist().await
    }

    /// Forget the checkpoint of a stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        self.state.write().await.streams.remove(stream);
        self.persist().await
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }

    /// Rewrite the backing file through a temporary sibling
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = self.to_json_pretty().await?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;
        Ok(())
    }
}
