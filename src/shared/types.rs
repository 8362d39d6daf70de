//! Shared state types

use super::resources::ResourcePool;
use crate::catalog::StreamIdentifier;
use crate::config::{ExtractConstants, SyncConfiguration};
use crate::output::OutputConsumer;
use crate::query::SelectQuerier;
use crate::state::StreamState;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of a `try_acquire_resources` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryAcquireResourcesStatus {
    ReadyToRun,
    RetryLater,
}

// ============================================================================
// Validation Failures
// ============================================================================

/// A persisted checkpoint that cannot be resumed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The state document itself is malformed
    InvalidState {
        stream: StreamIdentifier,
        message: String,
    },
    /// `pk` keys do not match the configured primary key, or fail to decode
    InvalidPrimaryKey {
        stream: StreamIdentifier,
        keys: Vec<String>,
    },
    /// `cursor` names another field, or its value fails to decode
    InvalidCursor {
        stream: StreamIdentifier,
        cursor: String,
    },
    /// Data previously emitted for the stream must be discarded
    ResetStream { stream: StreamIdentifier },
}

impl ValidationFailure {
    pub fn stream(&self) -> &StreamIdentifier {
        match self {
            ValidationFailure::InvalidState { stream, .. }
            | ValidationFailure::InvalidPrimaryKey { stream, .. }
            | ValidationFailure::InvalidCursor { stream, .. }
            | ValidationFailure::ResetStream { stream } => stream,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, ValidationFailure::ResetStream { .. })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::InvalidState { stream, message } => {
                write!(f, "Invalid state for stream {stream}: {message}")
            }
            ValidationFailure::InvalidPrimaryKey { stream, keys } => write!(
                f,
                "Invalid primary key [{}] in state for stream {stream}",
                keys.join(", ")
            ),
            ValidationFailure::InvalidCursor { stream, cursor } => {
                write!(f, "Invalid cursor '{cursor}' in state for stream {stream}")
            }
            ValidationFailure::ResetStream { stream } => {
                write!(f, "Stream {stream} must be reset")
            }
        }
    }
}

/// Collects validation failures until the engine drains them
#[derive(Debug, Default)]
pub struct ValidationFailureHandler {
    failures: Mutex<Vec<ValidationFailure>>,
}

impl ValidationFailureHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a failure
    pub fn accept(&self, failure: ValidationFailure) {
        tracing::warn!(stream = %failure.stream(), "{failure}");
        lock(&self.failures).push(failure);
    }

    /// Take the pending failures of one stream, oldest first
    pub fn drain(&self, stream: &StreamIdentifier) -> Vec<ValidationFailure> {
        let mut failures = lock(&self.failures);
        let (taken, kept): (Vec<_>, Vec<_>) = failures
            .drain(..)
            .partition(|failure| failure.stream() == stream);
        *failures = kept;
        taken
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// Everything creators and readers of one sync share
pub struct SharedState {
    configuration: SyncConfiguration,
    querier: Arc<dyn SelectQuerier>,
    output: Arc<dyn OutputConsumer>,
    resources: ResourcePool,
    validation_failures: ValidationFailureHandler,
    stream_states: Mutex<HashMap<StreamIdentifier, Arc<StreamState>>>,
}

impl SharedState {
    pub fn new(
        configuration: SyncConfiguration,
        querier: Arc<dyn SelectQuerier>,
        output: Arc<dyn OutputConsumer>,
    ) -> Self {
        let resources =
            ResourcePool::new(configuration.max_concurrency, configuration.heartbeat());
        Self {
            configuration,
            querier,
            output,
            resources,
            validation_failures: ValidationFailureHandler::new(),
            stream_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn configuration(&self) -> &SyncConfiguration {
        &self.configuration
    }

    pub fn constants(&self) -> &ExtractConstants {
        &self.configuration.constants
    }

    pub fn max_concurrency(&self) -> usize {
        self.configuration.max_concurrency
    }

    pub fn querier(&self) -> &Arc<dyn SelectQuerier> {
        &self.querier
    }

    pub fn output(&self) -> &Arc<dyn OutputConsumer> {
        &self.output
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn validation_failures(&self) -> &ValidationFailureHandler {
        &self.validation_failures
    }

    /// Runtime state of a stream, created on first use
    pub fn stream_state(&self, id: &StreamIdentifier) -> Arc<StreamState> {
        let mut states = lock(&self.stream_states);
        Arc::clone(states.entry(id.clone()).or_insert_with(|| {
            Arc::new(StreamState::new(
                id.clone(),
                self.configuration.constants.limit_policy,
            ))
        }))
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("configuration", &self.configuration)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}
