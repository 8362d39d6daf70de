//! Engine types
//!
//! Statistics gathered while syncing.

use std::fmt;

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Streams read to completion
    pub streams_synced: usize,
    /// Records handed to the output consumer
    pub records_synced: u64,
    /// State messages emitted
    pub checkpoints_emitted: usize,
    /// Partition readers run
    pub partitions_read: usize,
    /// Permit acquisitions that timed out and were retried
    pub resource_retries: usize,
    /// Streams reset because of an invalid checkpoint
    pub stream_resets: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: u64) {
        self.records_synced += count;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a checkpoint
    pub fn add_checkpoint(&mut self) {
        self.checkpoints_emitted += 1;
    }

    /// Add partitions
    pub fn add_partitions(&mut self, count: usize) {
        self.partitions_read += count;
    }

    /// Add a resource retry
    pub fn add_retry(&mut self) {
        self.resource_retries += 1;
    }

    /// Add a stream reset
    pub fn add_reset(&mut self) {
        self.stream_resets += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }

    /// Fold the counters of another run into these
    ///
    /// Durations are not summed; streams overlap in time.
    pub fn merge(&mut self, other: &SyncStats) {
        self.streams_synced += other.streams_synced;
        self.records_synced += other.records_synced;
        self.checkpoints_emitted += other.checkpoints_emitted;
        self.partitions_read += other.partitions_read;
        self.resource_retries += other.resource_retries;
        self.stream_resets += other.stream_resets;
        self.duration_ms = self.duration_ms.max(other.duration_ms);
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} streams, {} records, {} checkpoints, {} partitions in {}ms",
            self.streams_synced,
            self.records_synced,
            self.checkpoints_emitted,
            self.partitions_read,
            self.duration_ms
        )
    }
}
