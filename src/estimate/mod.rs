//! Sampling and size estimation
//!
//! Pure functions over a table sample: row byte sizes, a memory-safe fetch
//! size, the estimated table size and the split boundaries.
//!
//! # Overview
//!
//! - `Sample` / `SampleKind` - Sampled values and how they were obtained
//! - `RowByteSizeEstimator` - Approximate in-memory size of one row
//! - `FetchSizeEstimator` - Rows per fetch that fit the memory budget
//! - `SplitEstimator` - Partition count and boundary selection

mod estimators;
mod types;

pub use estimators::{FetchSizeEstimator, RowByteSizeEstimator, SplitEstimator};
pub use types::{Sample, SampleKind, SAMPLE_RATE_INV_POW2_SEQUENCE};
