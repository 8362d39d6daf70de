//! # Solidafy Extract
//!
//! Partitioned, checkpointed extraction of relational tables.
//!
//! A stream (one table) is sliced into bounded partitions that run under a
//! shared concurrency budget. Every partition read ends in a checkpoint, so an
//! interrupted sync resumes after the last checkpointed row and never skips
//! rows. Pieces of a failed split batch past its completed prefix are read
//! again on the next sync.
//!
//! ## Features
//!
//! - **Snapshot splitting**: Sample the table, estimate row sizes, and split a
//!   primary-key range into partitions that each fit a checkpoint interval
//! - **Cursor incremental**: Follow a cursor column up to its current maximum
//! - **Adaptive limits**: Resumable reads grow or shrink their `LIMIT` with
//!   the observed throughput
//! - **Invalid checkpoint recovery**: Stale states reset the stream instead of
//!   failing the sync
//! - **DuckDB source**: PostgreSQL, MySQL, SQLite or DuckDB tables through
//!   DuckDB extensions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_extract::{
//!     Catalog, DuckDbQuerier, ExtractJob, JsonLinesOutputConsumer, StateManager, SyncEngine,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_extract::Result<()> {
//!     let job = ExtractJob::from_file("job.yaml")?;
//!     let engine = SyncEngine::new(
//!         job.sync,
//!         Catalog::from_definitions(&job.streams)?,
//!         Arc::new(DuckDbQuerier::new(&job.connection)?),
//!         Arc::new(JsonLinesOutputConsumer::stdout()),
//!         StateManager::from_file("state.json")?,
//!     );
//!     let stats = engine.sync().await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ SyncEngine                                                          │
//! │   state → factory.create → creator.run → readers → checkpoint       │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │
//! ┌───────────┬────────────┬────────────────┬────────────┬──────────────┐
//! │ Partition │ Creator    │ Reader         │ Estimate   │ Shared       │
//! ├───────────┼────────────┼────────────────┼────────────┼──────────────┤
//! │ 5 kinds   │ Concurrent │ NonResumable   │ Sampling   │ Permits      │
//! │ Factory   │ Sequential │ Resumable      │ Row bytes  │ Stream state │
//! │ Split     │            │ CheckpointOnly │ Fetch size │              │
//! └───────────┴────────────┴────────────────┴────────────┴──────────────┘
//!                                   │
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ SelectQuerier (DuckDB, in-memory)  ·  OutputConsumer                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Sync configuration and job files
pub mod config;

/// Streams, fields and catalogs
pub mod catalog;

/// Checkpoint value codecs
pub mod codec;

/// Abstract select queries and row sources
pub mod query;

/// Checkpoint documents and persistence
pub mod state;

/// State shared by every creator and reader of a sync
pub mod shared;

/// Table sampling and size estimation
pub mod estimate;

/// Partitions and the partition factory
pub mod partition;

/// Partitions creators
pub mod creator;

/// Partition readers
pub mod reader;

/// Record and message sinks
pub mod output;

/// Main execution engine
pub mod engine;

/// Database support via DuckDB
pub mod database;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use catalog::{Catalog, Field, FieldType, Stream, StreamDefinition, StreamIdentifier};
pub use config::{ExtractJob, ExtractionMode, SyncConfiguration};
pub use database::{DatabaseConnectionDef, DuckDbQuerier};
pub use engine::{SyncEngine, SyncStats};
pub use output::{BufferingOutputConsumer, JsonLinesOutputConsumer, Message, OutputConsumer};
pub use query::{InMemorySelectQuerier, SelectQuerier};
pub use state::StateManager;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
