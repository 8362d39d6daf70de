//! Partitions creators
//!
//! A creator turns the partition produced by the factory into the readers
//! that will execute it.
//!
//! # Overview
//!
//! - `SequentialPartitionsCreator` - One reader per invocation, resumable
//!   whenever the partition allows it; keeps cursor order
//! - `ConcurrentPartitionsCreator` - Samples the partition and splits it into
//!   non-resumable readers that may run side by side
//! - `PartitionsCreatorFactory` - Picks a creator per partition
//!
//! Both creators query the cursor upper bound once per stream and sync before
//! anything else, and hold a permit while they query.

mod creators;
mod types;

pub use creators::{ConcurrentPartitionsCreator, SequentialPartitionsCreator};
pub use types::{PartitionsCreator, PartitionsCreatorFactory};
