//! Stream catalog
//!
//! A stream is one table (or view) to extract: its identifier, ordered
//! fields with their value types, sync mode, primary key and cursor.
//!
//! # Overview
//!
//! - `StreamDefinition` - Serializable stream entry as written in a job file
//! - `Stream` - Validated, immutable stream used by the rest of the crate
//! - `Catalog` - Ordered set of streams for one sync

mod types;

pub use types::{Catalog, Field, FieldType, Stream, StreamDefinition, StreamIdentifier};
