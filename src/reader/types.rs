//! Reader trait and shared types

use crate::error::Result;
use crate::partition::Partition;
use crate::shared::TryAcquireResourcesStatus;
use crate::state::OpaqueStateValue;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Checkpoint produced by a reader
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionReadCheckpoint {
    pub state: OpaqueStateValue,
    /// Records handed to the output since the previous checkpoint
    pub record_count: u64,
}

/// Row counters of one reader
///
/// `events == emitted + discarded` holds at every point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounters {
    pub emitted: u64,
    pub discarded: u64,
    pub events: u64,
}

impl ReadCounters {
    pub fn is_consistent(&self) -> bool {
        self.events == self.emitted + self.discarded
    }
}

/// Executes one partition
#[async_trait]
pub trait PartitionReader: Send {
    fn partition(&self) -> &Partition;

    /// Whether the reader stops at a limit and checkpoints mid-range
    fn is_resumable(&self) -> bool;

    /// Take a permit, waiting at most one heartbeat
    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus;

    /// Stream rows to the output until the query is exhausted or `cancel`
    /// fires
    ///
    /// Fails when no permit is held. Query failures are returned as is.
    async fn run(&mut self, cancel: CancellationToken) -> Result<()>;

    /// Checkpoint for the rows read so far, `None` if no valid one exists
    fn checkpoint(&mut self) -> Result<Option<PartitionReadCheckpoint>>;

    /// Return the permit; safe to call more than once
    fn release_resources(&mut self);

    fn counters(&self) -> ReadCounters;
}
