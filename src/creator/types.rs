//! Creator trait and factory

use super::creators::{ConcurrentPartitionsCreator, SequentialPartitionsCreator};
use crate::config::ExtractionMode;
use crate::error::Result;
use crate::partition::{Partition, PartitionKind};
use crate::reader::PartitionReader;
use crate::shared::{SharedState, TryAcquireResourcesStatus};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces the readers of one partition
#[async_trait]
pub trait PartitionsCreator: Send {
    fn partition(&self) -> &Partition;

    /// Take a permit, waiting at most one heartbeat
    async fn try_acquire_resources(&mut self) -> TryAcquireResourcesStatus;

    /// Query what is needed to plan the partition and return its readers
    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>>;

    /// Return the permit; safe to call more than once
    fn release_resources(&mut self);
}

/// Chooses between sequential and concurrent creators
#[derive(Debug, Clone)]
pub struct PartitionsCreatorFactory {
    shared: Arc<SharedState>,
}

impl PartitionsCreatorFactory {
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Creator for `partition`
    ///
    /// Partitions tied to a cursor are always read sequentially, one
    /// outstanding partition per stream. Snapshots without cursor are split
    /// in `Concurrent` mode, and in `Auto` mode when they start from the
    /// beginning of the table.
    pub fn make(&self, partition: Partition) -> Box<dyn PartitionsCreator> {
        let concurrent = match (self.shared.configuration().mode, partition.kind()) {
            (ExtractionMode::Sequential, _) => false,
            _ if partition.cursor().is_some() => false,
            (ExtractionMode::Concurrent, _) => true,
            (ExtractionMode::Auto, PartitionKind::SplittableSnapshot { lower_bound, .. }) => {
                lower_bound.is_none()
            }
            (ExtractionMode::Auto, _) => true,
        };
        let shared = Arc::clone(&self.shared);
        if concurrent {
            Box::new(ConcurrentPartitionsCreator::new(shared, partition))
        } else {
            Box::new(SequentialPartitionsCreator::new(shared, partition))
        }
    }
}
