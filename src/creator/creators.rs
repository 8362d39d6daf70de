//! Creator implementations

use super::types::PartitionsCreator;
use crate::codec::codec_for;
use crate::error::Result;
use crate::estimate::{
    FetchSizeEstimator, RowByteSizeEstimator, Sample, SampleKind, SplitEstimator,
    SAMPLE_RATE_INV_POW2_SEQUENCE,
};
use crate::partition::{Partition, PartitionFactory, PartitionKind};
use crate::query::QueryParameters;
use crate::reader::{
    CheckpointOnlyPartitionReader, NonResumablePartitionReader, PartitionReader,
    ResumablePartitionReader,
};
use crate::shared::{ResourceSlot, SharedState, TryAcquireResourcesStatus, ValidationFailure};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;

/// Query `MAX(cursor)` unless the partition's cursor upper bound is known
///
/// The first value stored for a stream stays frozen for the whole sync.
async fn ensure_cursor_upper_bound(shared: &SharedState, partition: &Partition) -> Result<()> {
    let (Some(cursor), Some(spec)) = (partition.cursor(), partition.cursor_upper_bound_query())
    else {
        return Ok(());
    };
    if partition.cursor_upper_bound().is_some() {
        return Ok(());
    }

    let mut rows = shared
        .querier()
        .execute_query(&spec, QueryParameters::default())
        .await?;
    let max = match rows.next().await {
        Some(row) => row?.remove(&cursor.id).unwrap_or(JsonValue::Null),
        None => JsonValue::Null,
    };
    let encoded = codec_for(cursor.field_type).encode(&max)?;
    let frozen = partition.stream_state().set_cursor_upper_bound(encoded);
    tracing::info!(
        stream = %partition.stream().id(),
        cursor = %cursor.id,
        upper_bound = %frozen,
        "Queried cursor upper bound"
    );
    Ok(())
}

/// Sample the partition, from the sparsest rate down to every row, until a
/// full sample is obtained
async fn collect_sample<T>(
    shared: &SharedState,
    partition: &Partition,
    mut map_row: impl FnMut(JsonObject) -> T + Send,
) -> Result<Sample<T>>
where
    T: Send,
{
    let max_sample_size = shared.constants().max_sample_size;
    for rate in SAMPLE_RATE_INV_POW2_SEQUENCE {
        let spec = partition.sampling_query(rate, max_sample_size);
        let mut rows = shared
            .querier()
            .execute_query(&spec, QueryParameters::default())
            .await?;
        let mut values = Vec::new();
        while let Some(row) = rows.next().await {
            values.push(map_row(row?));
        }
        tracing::debug!(
            partition = %partition,
            sample_rate_inv_pow2 = rate,
            rows = values.len(),
            "Sampled partition"
        );
        if let Some(kind) = SampleKind::classify(rate, values.len(), max_sample_size) {
            return Ok(Sample::new(values, kind, kind.value_weight(rate)));
        }
    }
    Ok(Sample::empty())
}

/// Readers for a cursor partition with nothing to read once its upper bound
/// is known
///
/// A stream that emptied out after its cursor was checkpointed is reset.
fn settled_readers(
    shared: &SharedState,
    partition: &Partition,
) -> Option<Vec<Box<dyn PartitionReader>>> {
    if partition.cursor_upper_bound()?.is_null() {
        if matches!(partition.kind(), PartitionKind::CursorIncremental { .. }) {
            shared
                .validation_failures()
                .accept(ValidationFailure::ResetStream {
                    stream: partition.stream().id().clone(),
                });
        }
        tracing::info!(partition = %partition, "Stream is empty, nothing to read");
        return Some(vec![checkpoint_only(partition)]);
    }
    if partition.is_caught_up() {
        tracing::info!(partition = %partition, "Cursor caught up, nothing to read");
        return Some(vec![checkpoint_only(partition)]);
    }
    None
}

fn checkpoint_only(partition: &Partition) -> Box<dyn PartitionReader> {
    Box::new(CheckpointOnlyPartitionReader::new(partition.clone()))
}

// ============================================================================
// Sequential
// ============================================================================

/// Produces exactly one reader per invocation
#[derive(Debug)]
pub struct SequentialPartitionsCreator {
    shared: Arc<SharedState>,
    partition: Partition,
    resources: ResourceSlot,
}

impl SequentialPartitionsCreator {
    pub fn new(shared: Arc<SharedState>, partition: Partition) -> Self {
        Self {
            resources: ResourceSlot::new(shared.resources().clone()),
            shared,
            partition,
        }
    }
}

#[async_trait]
impl PartitionsCreator for SequentialPartitionsCreator {
    fn partition(&self) -> &Partition {
        &self.partition
    }

    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus {
        self.resources.try_acquire().await
    }

    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>> {
        self.resources.ensure_held(&self.partition)?;
        ensure_cursor_upper_bound(&self.shared, &self.partition).await?;
        if let Some(readers) = settled_readers(&self.shared, &self.partition) {
            return Ok(readers);
        }

        let stream_state = self.partition.stream_state();
        let constants = self.shared.constants();
        if stream_state.fetch_size().is_none() && constants.with_sampling {
            let row_size = RowByteSizeEstimator::new(constants);
            let sample = collect_sample(&self.shared, &self.partition, |row| {
                row_size.estimate(&row)
            })
            .await?;
            let fetch_size =
                FetchSizeEstimator::new(constants, self.shared.max_concurrency()).apply(&sample);
            stream_state.set_fetch_size(fetch_size);
            tracing::info!(
                partition = %self.partition,
                sample_kind = ?sample.kind,
                fetch_size,
                "Estimated fetch size"
            );
            if sample.kind == SampleKind::Empty {
                return Ok(vec![checkpoint_only(&self.partition)]);
            }
        }

        let shared = Arc::clone(&self.shared);
        let partition = self.partition.clone();
        let reader: Box<dyn PartitionReader> = if partition.is_splittable() {
            Box::new(ResumablePartitionReader::new(shared, partition))
        } else {
            Box::new(NonResumablePartitionReader::new(shared, partition))
        };
        Ok(vec![reader])
    }

    fn release_resources(&mut self) {
        self.resources.release();
    }
}

// ============================================================================
// Concurrent
// ============================================================================

/// Splits a partition at sampled boundaries into independent readers
#[derive(Debug)]
pub struct ConcurrentPartitionsCreator {
    shared: Arc<SharedState>,
    partition: Partition,
    resources: ResourceSlot,
}

impl ConcurrentPartitionsCreator {
    pub fn new(shared: Arc<SharedState>, partition: Partition) -> Self {
        Self {
            resources: ResourceSlot::new(shared.resources().clone()),
            shared,
            partition,
        }
    }

    fn non_resumable(&self, partition: Partition) -> Box<dyn PartitionReader> {
        Box::new(NonResumablePartitionReader::new(
            Arc::clone(&self.shared),
            partition,
        ))
    }
}

#[async_trait]
impl PartitionsCreator for ConcurrentPartitionsCreator {
    fn partition(&self) -> &Partition {
        &self.partition
    }

    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus {
        self.resources.try_acquire().await
    }

    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>> {
        self.resources.ensure_held(&self.partition)?;
        ensure_cursor_upper_bound(&self.shared, &self.partition).await?;
        if let Some(readers) = settled_readers(&self.shared, &self.partition) {
            return Ok(readers);
        }

        let constants = self.shared.constants();
        if !constants.with_sampling {
            return Ok(vec![self.non_resumable(self.partition.clone())]);
        }

        let row_size = RowByteSizeEstimator::new(constants);
        let sample = collect_sample(&self.shared, &self.partition, |row| {
            (row_size.estimate(&row), row)
        })
        .await?;
        if sample.kind == SampleKind::Empty {
            return Ok(vec![checkpoint_only(&self.partition)]);
        }

        let row_sizes = sample.map(|(size, _)| *size);
        let fetch_size =
            FetchSizeEstimator::new(constants, self.shared.max_concurrency()).apply(&row_sizes);
        self.partition.stream_state().set_fetch_size(fetch_size);

        if !self.partition.is_splittable() {
            return Ok(vec![self.non_resumable(self.partition.clone())]);
        }

        let splitter = SplitEstimator::new(
            constants,
            self.shared.configuration().checkpoint_target_interval,
        );
        let partition_count = splitter.partition_count(&row_sizes);
        let ordered_states = sample
            .sampled_values
            .iter()
            .map(|(_, row)| self.partition.incomplete_state(row))
            .collect::<Result<Vec<_>>>()?;
        let boundaries = SplitEstimator::boundaries(&ordered_states, partition_count);

        let factory = PartitionFactory::new(Arc::clone(&self.shared));
        let partitions = factory.split(&self.partition, &boundaries)?;
        tracing::info!(
            partition = %self.partition,
            sample_kind = ?sample.kind,
            table_bytes = splitter.table_bytes(&row_sizes),
            partitions = partitions.len(),
            fetch_size,
            "Split partition"
        );
        Ok(partitions
            .into_iter()
            .map(|partition| self.non_resumable(partition))
            .collect())
    }

    fn release_resources(&mut self) {
        self.resources.release();
    }
}
