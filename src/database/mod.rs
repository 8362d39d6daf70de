//! Database connector support via DuckDB
//!
//! This module provides the reference row source: an embedded DuckDB
//! instance that either holds the tables itself or attaches PostgreSQL,
//! MySQL or SQLite through DuckDB extensions.
//!
//! # Overview
//!
//! - `DatabaseConnectionDef` - Connection settings from the job file
//! - `DuckDbQueryGenerator` - Renders query specs as DuckDB SQL
//! - `DuckDbQuerier` - `SelectQuerier` executing the rendered SQL

mod engine;
mod generator;
mod types;

pub use engine::DuckDbQuerier;
pub use generator::DuckDbQueryGenerator;
pub use types::{mask_password, DatabaseConnectionDef, DatabaseKind};
