//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Drives the partition factory, creators and readers of
//!   every stream and persists each checkpoint
//! - `SyncStats` - Counters for a sync run
//!
//! Every round of a stream loads the persisted state, asks the factory for
//! the next partition, runs its creator, then runs the readers it produced.
//! A single resumable reader is cancelled once the checkpoint interval has
//! elapsed; a batch of split readers checkpoints the end of its longest
//! completed prefix. The stream is done when the factory returns no
//! partition.

mod types;

pub use types::SyncStats;

use crate::catalog::{Catalog, Stream};
use crate::config::SyncConfiguration;
use crate::creator::PartitionsCreatorFactory;
use crate::error::{Error, Result};
use crate::output::{Message, OutputConsumer};
use crate::partition::{Partition, PartitionFactory};
use crate::query::SelectQuerier;
use crate::reader::{PartitionReadCheckpoint, PartitionReader};
use crate::shared::{SharedState, TryAcquireResourcesStatus};
use crate::state::{OpaqueStateValue, StateManager};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Consecutive rounds without a new checkpoint before a stream is failed
const MAX_STALLED_ROUNDS: usize = 32;

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Configuration, querier, output and permits shared with creators and readers
    shared: Arc<SharedState>,
    /// Streams to read
    catalog: Catalog,
    /// State manager
    state: StateManager,
    factory: PartitionFactory,
    creators: PartitionsCreatorFactory,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        configuration: SyncConfiguration,
        catalog: Catalog,
        querier: Arc<dyn SelectQuerier>,
        output: Arc<dyn OutputConsumer>,
        state: StateManager,
    ) -> Self {
        let shared = Arc::new(SharedState::new(configuration, querier, output));
        Self {
            factory: PartitionFactory::new(Arc::clone(&shared)),
            creators: PartitionsCreatorFactory::new(Arc::clone(&shared)),
            shared,
            catalog,
            state,
        }
    }

    /// Get the shared state
    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Sync every stream of the catalog
    ///
    /// Streams run concurrently and compete for the same permits. A failing
    /// stream does not interrupt the others; the first error is returned once
    /// all of them finished.
    pub async fn sync(&self) -> Result<SyncStats> {
        let start = Instant::now();
        let streams: Vec<Arc<Stream>> = self
            .catalog
            .streams()
            .iter()
            .cloned()
            .map(Arc::new)
            .collect();

        let results = join_all(streams.into_iter().map(|stream| self.sync_stream(stream))).await;

        let mut stats = SyncStats::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(stream_stats) => stats.merge(&stream_stats),
                Err(e) => {
                    tracing::error!("Stream failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        stats.set_duration(start.elapsed().as_millis() as u64);

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Sync completed: {stats}");
                Ok(stats)
            }
        }
    }

    /// Sync a single stream until the factory has no partition left
    pub async fn sync_stream(&self, stream: Arc<Stream>) -> Result<SyncStats> {
        let start = Instant::now();
        let label = stream.label();
        let mut stats = SyncStats::new();
        tracing::info!(stream = %label, "Starting sync");

        // A completed full refresh starts over on the next sync
        if !stream.is_incremental() && self.state.get(&label).await == Some(json!({})) {
            tracing::info!(stream = %label, "Previous snapshot completed, starting over");
            self.state.clear_stream(&label).await?;
        }

        let mut stalled_rounds = 0;
        loop {
            let persisted = self.state.get(&label).await;
            let partition = self.factory.create(&stream, persisted.as_ref());
            self.handle_validation_failures(&stream, &mut stats).await?;
            let Some(partition) = partition else {
                break;
            };
            tracing::debug!(partition = %partition, "Created partition");

            let at_minimum_limit = partition.stream_state().limit().is_minimum();
            let readers = self.run_creator(partition, &mut stats).await?;
            self.handle_validation_failures(&stream, &mut stats).await?;
            let checkpoint = self
                .run_readers(&label, persisted.as_ref(), readers, &mut stats)
                .await?;

            match checkpoint {
                Some(checkpoint) if persisted.as_ref() != Some(&checkpoint.state) => {
                    self.persist(&label, checkpoint, &mut stats).await?;
                    stalled_rounds = 0;
                }
                Some(_) => stalled_rounds += 1,
                None => {
                    if at_minimum_limit {
                        return Err(Error::partition(
                            &label,
                            "no row read within the checkpoint interval at the minimum limit",
                        ));
                    }
                    stalled_rounds += 1;
                }
            }
            if stalled_rounds >= MAX_STALLED_ROUNDS {
                return Err(Error::partition(
                    &label,
                    format!("no progress after {stalled_rounds} rounds"),
                ));
            }
        }

        stats.add_stream();
        stats.set_duration(start.elapsed().as_millis() as u64);
        tracing::info!(stream = %label, "Completed sync: {stats}");
        Ok(stats)
    }

    /// Emit resets and warnings reported while creating a partition
    async fn handle_validation_failures(
        &self,
        stream: &Stream,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let label = stream.label();
        let output = self.shared.output();
        for failure in self.shared.validation_failures().drain(stream.id()) {
            if failure.is_reset() {
                output.accept_message(Message::stream_reset(&label));
                self.state.clear_stream(&label).await?;
                stats.add_reset();
            } else {
                output.accept_message(Message::warn(failure.to_string()));
            }
        }
        Ok(())
    }

    async fn run_creator(
        &self,
        partition: Partition,
        stats: &mut SyncStats,
    ) -> Result<Vec<Box<dyn PartitionReader>>> {
        let mut creator = self.creators.make(partition);
        while creator.try_acquire_resources().await == TryAcquireResourcesStatus::RetryLater {
            tracing::debug!(partition = %creator.partition(), "Waiting for resources");
            stats.add_retry();
        }
        let readers = creator.run().await;
        creator.release_resources();
        readers
    }

    /// Run the readers of one round and combine their checkpoints
    ///
    /// Readers cover contiguous ranges in order. The combined checkpoint is
    /// the one of the last reader of the longest completed prefix, `None` if
    /// the first reader did not complete. When a reader fails, that prefix
    /// is persisted before the error is returned.
    async fn run_readers(
        &self,
        label: &str,
        persisted: Option<&OpaqueStateValue>,
        mut readers: Vec<Box<dyn PartitionReader>>,
        stats: &mut SyncStats,
    ) -> Result<Option<PartitionReadCheckpoint>> {
        stats.add_partitions(readers.len());
        let soft_timeout = readers.len() == 1 && readers[0].is_resumable();

        let results = join_all(
            readers
                .iter_mut()
                .map(|reader| self.run_reader(reader, soft_timeout)),
        )
        .await;
        for reader in &readers {
            stats.add_records(reader.counters().emitted);
        }

        let mut combined: Option<PartitionReadCheckpoint> = None;
        let mut prefix_open = true;
        let mut first_error = None;
        for (reader, result) in readers.iter_mut().zip(results) {
            match result {
                Ok(retries) => {
                    stats.resource_retries += retries;
                    if !prefix_open {
                        continue;
                    }
                    let Some(checkpoint) = reader.checkpoint()? else {
                        tracing::debug!(partition = %reader.partition(), "Reader did not complete");
                        prefix_open = false;
                        continue;
                    };
                    let record_count =
                        checkpoint.record_count + combined.as_ref().map_or(0, |c| c.record_count);
                    combined = Some(PartitionReadCheckpoint {
                        state: checkpoint.state,
                        record_count,
                    });
                }
                Err(e) => {
                    prefix_open = false;
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some(e) = first_error else {
            return Ok(combined);
        };
        if let Some(checkpoint) = combined.filter(|c| persisted != Some(&c.state)) {
            tracing::warn!(stream = %label, "Read failed, keeping progress of completed partitions");
            self.persist(label, checkpoint, stats).await?;
        }
        Err(e)
    }

    /// Acquire, run and release one reader, returning the number of retries
    async fn run_reader(
        &self,
        reader: &mut Box<dyn PartitionReader>,
        soft_timeout: bool,
    ) -> Result<usize> {
        let mut retries = 0;
        while reader.try_acquire_resources().await == TryAcquireResourcesStatus::RetryLater {
            retries += 1;
        }

        let cancel = CancellationToken::new();
        let result = if soft_timeout {
            let interval = self.shared.configuration().checkpoint_interval();
            let run = reader.run(cancel.clone());
            tokio::pin!(run);
            tokio::select! {
                result = &mut run => result,
                () = tokio::time::sleep(interval) => {
                    tracing::debug!("Checkpoint interval elapsed, cancelling read");
                    cancel.cancel();
                    run.await
                }
            }
        } else {
            reader.run(cancel).await
        };
        reader.release_resources();
        result.map(|()| retries)
    }

    async fn persist(
        &self,
        label: &str,
        checkpoint: PartitionReadCheckpoint,
        stats: &mut SyncStats,
    ) -> Result<()> {
        self.state
            .set(label, checkpoint.state.clone(), checkpoint.record_count)
            .await?;
        self.shared
            .output()
            .accept_message(Message::state(label, checkpoint.state));
        stats.add_checkpoint();
        tracing::debug!(stream = %label, records = checkpoint.record_count, "Checkpoint persisted");
        Ok(())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("shared", &self.shared)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
