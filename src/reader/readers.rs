//! Reader implementations

use super::types::{PartitionReadCheckpoint, PartitionReader, ReadCounters};
use crate::error::Result;
use crate::output::{RecordDisposition, StreamRecord};
use crate::partition::Partition;
use crate::query::{QueryParameters, SelectQuerySpec};
use crate::shared::{ResourceSlot, SharedState, TryAcquireResourcesStatus};
use crate::types::JsonObject;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a read ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    NotRun,
    Completed,
    Cancelled,
}

/// Execute `spec` and hand every row to the output
///
/// Cancellation is checked before each row. Counters and the last record are
/// updated together with the hand-off, so they stay exact even if the
/// returned future is dropped mid-read.
async fn read_rows(
    shared: &SharedState,
    partition: &Partition,
    spec: &SelectQuerySpec,
    cancel: &CancellationToken,
    counters: &mut ReadCounters,
    last_record: &mut Option<JsonObject>,
) -> Result<ReadOutcome> {
    let parameters = QueryParameters {
        reuse_result_object: true,
        fetch_size: partition.stream_state().fetch_size(),
    };
    let mut rows = shared.querier().execute_query(spec, parameters).await?;
    let stream = partition.stream().id();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ReadOutcome::Cancelled),
            row = rows.next() => row,
        };
        let Some(row) = next else {
            return Ok(ReadOutcome::Completed);
        };
        let row = row?;

        let record = StreamRecord {
            stream: stream.clone(),
            data: row.clone(),
        };
        counters.events += 1;
        match shared.output().accept(record) {
            RecordDisposition::Emitted => counters.emitted += 1,
            RecordDisposition::Discarded => counters.discarded += 1,
        }
        *last_record = Some(row);
    }
}

// ============================================================================
// Non-Resumable
// ============================================================================

/// Reads a whole partition without ordering or limit
#[derive(Debug)]
pub struct NonResumablePartitionReader {
    shared: Arc<SharedState>,
    partition: Partition,
    resources: ResourceSlot,
    counters: ReadCounters,
    outcome: ReadOutcome,
}

impl NonResumablePartitionReader {
    pub fn new(shared: Arc<SharedState>, partition: Partition) -> Self {
        Self {
            resources: ResourceSlot::new(shared.resources().clone()),
            shared,
            partition,
            counters: ReadCounters::default(),
            outcome: ReadOutcome::NotRun,
        }
    }
}

#[async_trait]
impl PartitionReader for NonResumablePartitionReader {
    fn partition(&self) -> &Partition {
        &self.partition
    }

    fn is_resumable(&self) -> bool {
        false
    }

    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus {
        self.resources.try_acquire().await
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.resources.ensure_held(&self.partition)?;
        let spec = self.partition.non_resumable_query();
        tracing::debug!(partition = %self.partition, "Reading partition");

        // Stays `Cancelled` if this future is dropped mid-read.
        self.outcome = ReadOutcome::Cancelled;
        let mut last_record = None;
        self.outcome = read_rows(
            &self.shared,
            &self.partition,
            &spec,
            &cancel,
            &mut self.counters,
            &mut last_record,
        )
        .await?;

        debug_assert!(self.counters.is_consistent());
        tracing::debug!(
            partition = %self.partition,
            emitted = self.counters.emitted,
            discarded = self.counters.discarded,
            outcome = ?self.outcome,
            "Partition read finished"
        );
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<Option<PartitionReadCheckpoint>> {
        if self.outcome != ReadOutcome::Completed {
            return Ok(None);
        }
        Ok(Some(PartitionReadCheckpoint {
            state: self.partition.complete_state()?,
            record_count: self.counters.emitted,
        }))
    }

    fn release_resources(&mut self) {
        self.resources.release();
    }

    fn counters(&self) -> ReadCounters {
        self.counters
    }
}

// ============================================================================
// Resumable
// ============================================================================

/// Reads one `LIMIT`ed chunk of a partition in checkpoint-column order
#[derive(Debug)]
pub struct ResumablePartitionReader {
    shared: Arc<SharedState>,
    partition: Partition,
    resources: ResourceSlot,
    counters: ReadCounters,
    outcome: ReadOutcome,
    last_record: Option<JsonObject>,
    /// Limit the chunk was read with
    incumbent_limit: u64,
    limit_adjusted: bool,
}

impl ResumablePartitionReader {
    pub fn new(shared: Arc<SharedState>, partition: Partition) -> Self {
        let incumbent_limit = partition.stream_state().limit().current();
        Self {
            resources: ResourceSlot::new(shared.resources().clone()),
            shared,
            partition,
            counters: ReadCounters::default(),
            outcome: ReadOutcome::NotRun,
            last_record: None,
            incumbent_limit,
            limit_adjusted: false,
        }
    }

    fn adjust_limit(&mut self) {
        if self.limit_adjusted {
            return;
        }
        self.limit_adjusted = true;
        let stream_state = self.partition.stream_state();
        let limit = match self.outcome {
            ReadOutcome::Completed => stream_state.update_limit(|limit| limit.up()),
            ReadOutcome::Cancelled => stream_state.update_limit(|limit| limit.down()),
            ReadOutcome::NotRun => return,
        };
        tracing::info!(
            stream = %self.partition.stream().id(),
            previous = self.incumbent_limit,
            limit = limit.current(),
            "Adjusted resumable read limit"
        );
    }
}

#[async_trait]
impl PartitionReader for ResumablePartitionReader {
    fn partition(&self) -> &Partition {
        &self.partition
    }

    fn is_resumable(&self) -> bool {
        true
    }

    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus {
        self.resources.try_acquire().await
    }

    async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        self.resources.ensure_held(&self.partition)?;
        self.incumbent_limit = self.partition.stream_state().limit().current();
        let spec = self.partition.resumable_query(self.incumbent_limit)?;
        tracing::debug!(
            partition = %self.partition,
            limit = self.incumbent_limit,
            "Reading partition chunk"
        );

        // Stays `Cancelled` if this future is dropped mid-read.
        self.outcome = ReadOutcome::Cancelled;
        self.outcome = read_rows(
            &self.shared,
            &self.partition,
            &spec,
            &cancel,
            &mut self.counters,
            &mut self.last_record,
        )
        .await?;

        debug_assert!(self.counters.is_consistent());
        tracing::debug!(
            partition = %self.partition,
            emitted = self.counters.emitted,
            discarded = self.counters.discarded,
            outcome = ?self.outcome,
            "Partition chunk finished"
        );
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<Option<PartitionReadCheckpoint>> {
        if self.outcome == ReadOutcome::NotRun {
            return Ok(None);
        }
        if self.outcome == ReadOutcome::Completed && self.counters.events < self.incumbent_limit {
            // Fewer rows than the limit: the range is exhausted.
            return Ok(Some(PartitionReadCheckpoint {
                state: self.partition.complete_state()?,
                record_count: self.counters.emitted,
            }));
        }

        self.adjust_limit();
        match &self.last_record {
            Some(last_record) => Ok(Some(PartitionReadCheckpoint {
                state: self.partition.incomplete_state(last_record)?,
                record_count: self.counters.emitted,
            })),
            None => Ok(None),
        }
    }

    fn release_resources(&mut self) {
        self.resources.release();
    }

    fn counters(&self) -> ReadCounters {
        self.counters
    }
}

// ============================================================================
// Checkpoint Only
// ============================================================================

/// Emits the complete state of a partition known to be empty
#[derive(Debug)]
pub struct CheckpointOnlyPartitionReader {
    partition: Partition,
}

impl CheckpointOnlyPartitionReader {
    pub fn new(partition: Partition) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl PartitionReader for CheckpointOnlyPartitionReader {
    fn partition(&self) -> &Partition {
        &self.partition
    }

    fn is_resumable(&self) -> bool {
        false
    }

    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus {
        TryAcquireResourcesStatus::ReadyToRun
    }

    async fn run(&mut self, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<Option<PartitionReadCheckpoint>> {
        Ok(Some(PartitionReadCheckpoint {
            state: self.partition.complete_state()?,
            record_count: 0,
        }))
    }

    fn release_resources(&mut self) {}

    fn counters(&self) -> ReadCounters {
        ReadCounters::default()
    }
}
