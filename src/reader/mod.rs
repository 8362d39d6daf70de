//! Partition readers
//!
//! A reader executes one partition's query, hands every row to the output
//! consumer and produces the checkpoint that reflects exactly those rows.
//!
//! # Overview
//!
//! - `NonResumablePartitionReader` - Whole range in one go; checkpoints only
//!   once the range is exhausted
//! - `ResumablePartitionReader` - `LIMIT`ed chunk in checkpoint-column order;
//!   checkpoints after the last row read and tunes the stream's limit
//! - `CheckpointOnlyPartitionReader` - Reads nothing, emits the complete state
//!
//! Every reader but the checkpoint-only one holds a permit from the shared
//! pool while it runs.

mod readers;
mod types;

pub use readers::{
    CheckpointOnlyPartitionReader, NonResumablePartitionReader, ResumablePartitionReader,
};
pub use types::{PartitionReadCheckpoint, PartitionReader, ReadCounters};

#[cfg(test)]
mod tests;
