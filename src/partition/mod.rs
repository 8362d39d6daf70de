//! Partitions
//!
//! A partition is a bounded, independently resumable slice of a stream's rows.
//!
//! # Overview
//!
//! - `Partition` / `PartitionKind` - What a slice covers, how to query and
//!   checkpoint it
//! - `PartitionFactory` - Builds the next partition from the last checkpoint
//!   and splits partitions at sampled boundaries
//!
//! # Lifecycle
//!
//! ```text
//! cold start ──► snapshot (pk ranges) ──► cursor incremental ──► caught up
//!                    │      ▲                   │      ▲
//!                    └──────┘                   └──────┘
//!                  {"pk": ..}               {"cursor": ..}
//! ```

mod factory;
mod types;

pub use factory::PartitionFactory;
pub use types::{Partition, PartitionKind};

#[cfg(test)]
mod tests;
