//! CLI module
//!
//! Command-line interface for running extraction jobs.
//!
//! # Commands
//!
//! - `check` - Test connection to the source database
//! - `streams` - List tables of the source database
//! - `read` - Extract the job's streams, writing records and states to stdout

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
