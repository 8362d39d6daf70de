//! Estimators
//!
//! Deterministic functions of a sample and the sync constants.

use super::types::Sample;
use crate::config::ExtractConstants;
use crate::types::JsonObject;

// ============================================================================
// Row Size
// ============================================================================

/// Approximate in-memory size of a row
#[derive(Debug, Clone, Copy)]
pub struct RowByteSizeEstimator {
    record_overhead_bytes: u64,
    field_overhead_bytes: u64,
}

impl RowByteSizeEstimator {
    pub fn new(constants: &ExtractConstants) -> Self {
        Self {
            record_overhead_bytes: constants.estimated_record_overhead_bytes,
            field_overhead_bytes: constants.estimated_field_overhead_bytes,
        }
    }

    /// Record overhead plus, per field, the field overhead and the length of
    /// its JSON rendering
    pub fn estimate(&self, row: &JsonObject) -> u64 {
        row.values().fold(self.record_overhead_bytes, |total, value| {
            let value_bytes = serde_json::to_vec(value).map_or(0, |bytes| bytes.len() as u64);
            total + self.field_overhead_bytes + value_bytes
        })
    }
}

// ============================================================================
// Fetch Size
// ============================================================================

/// Rows per fetch such that every concurrent reader stays within its share of
/// the memory budget
#[derive(Debug, Clone, Copy)]
pub struct FetchSizeEstimator {
    max_memory_bytes: u64,
    memory_capacity_ratio: f64,
    max_concurrency: usize,
    min_fetch_size: usize,
    default_fetch_size: usize,
    max_fetch_size: usize,
}

impl FetchSizeEstimator {
    pub fn new(constants: &ExtractConstants, max_concurrency: usize) -> Self {
        Self {
            max_memory_bytes: constants.max_memory_bytes(),
            memory_capacity_ratio: constants.memory_capacity_ratio,
            max_concurrency: max_concurrency.max(1),
            min_fetch_size: constants.min_fetch_size,
            default_fetch_size: constants.default_fetch_size,
            max_fetch_size: constants.max_fetch_size,
        }
    }

    /// Fetch size for a sample of row byte sizes
    ///
    /// Sized by the largest sampled row. Falls back to the default fetch
    /// size when the sample is empty.
    pub fn apply(&self, row_byte_sizes: &Sample<u64>) -> usize {
        let Some(max_row_bytes) = row_byte_sizes
            .sampled_values
            .iter()
            .copied()
            .max()
            .filter(|&bytes| bytes > 0)
        else {
            return self.default_fetch_size;
        };

        let memory = (self.max_memory_bytes as f64 * self.memory_capacity_ratio).round() as u64;
        let per_reader = memory / self.max_concurrency as u64;
        let rows = usize::try_from(per_reader / max_row_bytes).unwrap_or(usize::MAX);
        rows.clamp(self.min_fetch_size, self.max_fetch_size)
    }
}

// ============================================================================
// Splitting
// ============================================================================

/// Sizes partitions so each one is read in about one checkpoint interval
#[derive(Debug, Clone, Copy)]
pub struct SplitEstimator {
    target_partition_bytes: u64,
}

impl SplitEstimator {
    pub fn new(constants: &ExtractConstants, checkpoint_interval_secs: u64) -> Self {
        Self {
            target_partition_bytes: constants
                .expected_throughput_bytes_per_second
                .saturating_mul(checkpoint_interval_secs.max(1))
                .max(1),
        }
    }

    /// Estimated size of the sampled range
    pub fn table_bytes(&self, row_byte_sizes: &Sample<u64>) -> u64 {
        row_byte_sizes
            .sampled_values
            .iter()
            .sum::<u64>()
            .saturating_mul(row_byte_sizes.value_weight)
    }

    /// Number of partitions to split the sampled range into
    ///
    /// At least one, and never more than there are sampled rows to cut at.
    pub fn partition_count(&self, row_byte_sizes: &Sample<u64>) -> usize {
        let total = self.table_bytes(row_byte_sizes);
        let wanted = usize::try_from(total.div_ceil(self.target_partition_bytes))
            .unwrap_or(usize::MAX);
        wanted.clamp(1, row_byte_sizes.len().max(1))
    }

    /// `partition_count - 1` evenly spaced values of an ordered sample
    ///
    /// Consecutive duplicates are dropped, so fewer boundaries may come back
    /// when the sampled keys repeat.
    pub fn boundaries<T: Clone + PartialEq>(ordered: &[T], partition_count: usize) -> Vec<T> {
        let mut boundaries: Vec<T> = Vec::new();
        if ordered.is_empty() {
            return boundaries;
        }
        for i in 1..partition_count {
            let value = &ordered[(i * ordered.len() / partition_count).min(ordered.len() - 1)];
            if boundaries.last() != Some(value) {
                boundaries.push(value.clone());
            }
        }
        boundaries
    }
}
