//! Per-stream runtime state
//!
//! Lives for one sync. Written only by the creator or reader currently
//! responsible for the stream.

use crate::catalog::StreamIdentifier;
use crate::config::LimitPolicy;
use crate::types::JsonValue;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Limit State
// ============================================================================

/// Row limit of resumable reads, grown on full reads and shrunk on timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitState {
    current: u64,
    policy: LimitPolicy,
}

impl LimitState {
    pub fn new(policy: LimitPolicy) -> Self {
        Self {
            current: policy.initial.clamp(policy.minimum, policy.maximum),
            policy,
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Next limit after a read that finished within the interval
    #[must_use]
    pub fn up(self) -> Self {
        Self {
            current: self
                .current
                .saturating_mul(self.policy.factor)
                .min(self.policy.maximum),
            policy: self.policy,
        }
    }

    /// Next limit after a read that was cut off
    #[must_use]
    pub fn down(self) -> Self {
        Self {
            current: (self.current / self.policy.factor).max(self.policy.minimum),
            policy: self.policy,
        }
    }

    pub fn is_minimum(&self) -> bool {
        self.current == self.policy.minimum
    }
}

// ============================================================================
// Stream State
// ============================================================================

/// Mutable facts about one stream during a sync
#[derive(Debug)]
pub struct StreamState {
    id: StreamIdentifier,
    policy: LimitPolicy,
    /// `None` until queried; `Some(Null)` when the table was empty
    cursor_upper_bound: Mutex<Option<JsonValue>>,
    fetch_size: Mutex<Option<usize>>,
    limit: Mutex<LimitState>,
}

impl StreamState {
    pub fn new(id: StreamIdentifier, policy: LimitPolicy) -> Self {
        Self {
            id,
            policy,
            cursor_upper_bound: Mutex::new(None),
            fetch_size: Mutex::new(None),
            limit: Mutex::new(LimitState::new(policy)),
        }
    }

    pub fn id(&self) -> &StreamIdentifier {
        &self.id
    }

    /// Cursor upper bound, if already queried
    pub fn cursor_upper_bound(&self) -> Option<JsonValue> {
        lock(&self.cursor_upper_bound).clone()
    }

    /// Freeze the cursor upper bound
    ///
    /// The first value wins; later calls return it unchanged.
    pub fn set_cursor_upper_bound(&self, value: JsonValue) -> JsonValue {
        lock(&self.cursor_upper_bound)
            .get_or_insert(value)
            .clone()
    }

    pub fn fetch_size(&self) -> Option<usize> {
        *lock(&self.fetch_size)
    }

    pub fn set_fetch_size(&self, fetch_size: usize) {
        *lock(&self.fetch_size) = Some(fetch_size);
    }

    pub fn limit(&self) -> LimitState {
        *lock(&self.limit)
    }

    /// Apply `f` to the limit and return the new value
    pub fn update_limit(&self, f: impl FnOnce(LimitState) -> LimitState) -> LimitState {
        let mut guard = lock(&self.limit);
        *guard = f(*guard);
        *guard
    }

    /// Forget everything learned so far, after the stream was reset
    pub fn reset(&self) {
        *lock(&self.cursor_upper_bound) = None;
        *lock(&self.fetch_size) = None;
        *lock(&self.limit) = LimitState::new(self.policy);
    }
}
