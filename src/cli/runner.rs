//! CLI runner - executes commands

use crate::catalog::Catalog;
use crate::cli::commands::{parse_stream_list, Cli, Commands, OutputFormat};
use crate::config::ExtractJob;
use crate::database::DuckDbQuerier;
use crate::engine::SyncEngine;
use crate::error::{Error, Result, ResultExt};
use crate::output::JsonLinesOutputConsumer;
use crate::state::StateManager;
use serde_json::{json, Value};
use std::sync::Arc;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check(),
            Commands::Streams => self.streams(),
            Commands::Read { streams } => self.read(streams.as_deref()).await,
        }
    }

    fn load_job(&self) -> Result<ExtractJob> {
        let path = self
            .cli
            .job
            .as_ref()
            .ok_or_else(|| Error::config("No job file specified (use --job)"))?;
        ExtractJob::from_file(path)
            .with_context(|| format!("Failed to load job {}", path.display()))
    }

    fn load_state(&self) -> Result<StateManager> {
        if let Some(state_json) = &self.cli.state_json {
            StateManager::from_json(state_json)
        } else if let Some(path) = &self.cli.state {
            StateManager::from_file(path)
        } else {
            Ok(StateManager::in_memory())
        }
    }

    /// Test the connection and report how many tables are visible
    fn check(&self) -> Result<()> {
        let job = self.load_job()?;
        let status = match DuckDbQuerier::new(&job.connection)
            .and_then(|querier| querier.check_connection().map(|()| querier))
        {
            Ok(querier) => {
                let table_count = querier.list_tables().map(|t| t.len()).unwrap_or(0);
                json!({
                    "status": "SUCCEEDED",
                    "message": format!("Connection successful. Found {table_count} tables.")
                })
            }
            Err(e) => json!({
                "status": "FAILED",
                "message": format!("Connection check failed: {e}")
            }),
        };

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": status
        }));
        Ok(())
    }

    /// List source tables next to the streams configured in the job
    fn streams(&self) -> Result<()> {
        let job = self.load_job()?;
        let querier = DuckDbQuerier::new(&job.connection)?;
        let tables = querier.list_tables()?;
        let configured: Vec<String> = job
            .streams
            .iter()
            .map(|s| match &s.namespace {
                Some(namespace) => format!("{namespace}.{}", s.name),
                None => s.name.clone(),
            })
            .collect();

        self.output_message(&json!({
            "type": "STREAMS",
            "streams": tables,
            "configured": configured,
            "engine": querier.kind().to_string()
        }));
        Ok(())
    }

    /// Extract the selected streams, writing JSON lines to stdout
    async fn read(&self, streams: Option<&str>) -> Result<()> {
        let job = self.load_job()?;
        let catalog = Catalog::from_definitions(&job.streams)?;
        let catalog = match streams.map(parse_stream_list) {
            Some(names) if !names.is_empty() => catalog.select(&names)?,
            _ => catalog,
        };
        if catalog.is_empty() {
            return Err(Error::config("Job has no streams to read"));
        }

        let querier = Arc::new(DuckDbQuerier::new(&job.connection)?);
        tracing::info!(
            connection = %querier.connection_info(),
            streams = catalog.len(),
            "Starting read"
        );

        let output = Arc::new(JsonLinesOutputConsumer::stdout());
        let engine = SyncEngine::new(
            job.sync,
            catalog,
            querier,
            Arc::clone(&output) as _,
            self.load_state()?,
        );
        let result = engine.sync().await;
        output.flush()?;

        let stats = result?;
        tracing::info!(
            records = stats.records_synced,
            checkpoints = stats.checkpoints_emitted,
            duration_ms = stats.duration_ms,
            "Read completed"
        );
        Ok(())
    }

    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
