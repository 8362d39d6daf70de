//! Configuration types for extraction jobs
//!
//! This module contains the sync-wide knobs (concurrency, checkpoint cadence,
//! fetch/sample sizing constants) and the job file layout read by the CLI.
//! Everything deserializes from YAML or JSON with defaults for every field.

use crate::catalog::StreamDefinition;
use crate::database::DatabaseConnectionDef;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Memory budget assumed when no explicit value is configured (1 GiB)
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 1 << 30;

// ============================================================================
// Job File
// ============================================================================

/// Complete extraction job loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractJob {
    /// Source database connection
    pub connection: DatabaseConnectionDef,

    /// Streams (tables) to extract
    #[serde(default)]
    pub streams: Vec<StreamDefinition>,

    /// Sync settings
    #[serde(default)]
    pub sync: SyncConfiguration,
}

impl ExtractJob {
    /// Parse a job from a YAML string
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let job: Self = serde_yaml::from_str(contents)?;
        job.sync.validate()?;
        Ok(job)
    }

    /// Load a job from a YAML or JSON file (by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let job: Self = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        job.sync.validate()?;
        Ok(job)
    }
}

// ============================================================================
// Sync Configuration
// ============================================================================

/// How partitions creators are chosen for a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Split full-refresh snapshots that start from scratch, sequential
    /// otherwise
    #[default]
    Auto,
    /// Split every full-refresh snapshot; cursor ranges stay sequential
    Concurrent,
    /// Always read one resumable partition at a time
    Sequential,
}

/// Sync-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfiguration {
    /// Size of the permit pool shared by all creators and readers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Target interval between checkpoints, in seconds
    #[serde(default = "default_checkpoint_target_interval")]
    pub checkpoint_target_interval: u64,

    /// How long to wait for a permit before giving up, in milliseconds
    #[serde(default = "default_resource_acquisition_heartbeat")]
    pub resource_acquisition_heartbeat: u64,

    /// Creator selection
    #[serde(default)]
    pub mode: ExtractionMode,

    /// Sizing constants
    #[serde(default)]
    pub constants: ExtractConstants,
}

fn default_max_concurrency() -> usize {
    1
}

fn default_checkpoint_target_interval() -> u64 {
    60
}

fn default_resource_acquisition_heartbeat() -> u64 {
    100
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            checkpoint_target_interval: default_checkpoint_target_interval(),
            resource_acquisition_heartbeat: default_resource_acquisition_heartbeat(),
            mode: ExtractionMode::default(),
            constants: ExtractConstants::default(),
        }
    }
}

impl SyncConfiguration {
    /// Parse from a YAML string
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checkpoint interval as a duration
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_target_interval)
    }

    /// Permit acquisition heartbeat as a duration
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.resource_acquisition_heartbeat)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::invalid_config(
                "max_concurrency",
                "must be at least 1",
            ));
        }
        if self.checkpoint_target_interval == 0 {
            return Err(Error::invalid_config(
                "checkpoint_target_interval",
                "must be at least 1 second",
            ));
        }
        self.constants.validate()
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Fetch-size, sampling and memory constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConstants {
    /// Sample tables before reading them
    #[serde(default)]
    pub with_sampling: bool,

    /// Maximum number of rows returned by a sampling query
    #[serde(default = "default_max_sample_size")]
    pub max_sample_size: usize,

    /// Expected read throughput, used to size partitions
    #[serde(default = "default_expected_throughput")]
    pub expected_throughput_bytes_per_second: u64,

    #[serde(default = "default_min_fetch_size")]
    pub min_fetch_size: usize,

    #[serde(default = "default_default_fetch_size")]
    pub default_fetch_size: usize,

    #[serde(default = "default_max_fetch_size")]
    pub max_fetch_size: usize,

    /// Share of memory that fetched rows may occupy
    #[serde(default = "default_memory_capacity_ratio")]
    pub memory_capacity_ratio: f64,

    #[serde(default = "default_overhead_bytes")]
    pub estimated_record_overhead_bytes: u64,

    #[serde(default = "default_overhead_bytes")]
    pub estimated_field_overhead_bytes: u64,

    /// Overrides the memory budget
    #[serde(default)]
    pub max_memory_bytes_for_testing: Option<u64>,

    /// Growth policy of the resumable read limit
    #[serde(default)]
    pub limit_policy: LimitPolicy,
}

fn default_max_sample_size() -> usize {
    1024
}

fn default_expected_throughput() -> u64 {
    10 * 1024 * 1024
}

fn default_min_fetch_size() -> usize {
    10
}

fn default_default_fetch_size() -> usize {
    1_000
}

fn default_max_fetch_size() -> usize {
    10_000_000
}

fn default_memory_capacity_ratio() -> f64 {
    0.6
}

fn default_overhead_bytes() -> u64 {
    16
}

impl Default for ExtractConstants {
    fn default() -> Self {
        Self {
            with_sampling: false,
            max_sample_size: default_max_sample_size(),
            expected_throughput_bytes_per_second: default_expected_throughput(),
            min_fetch_size: default_min_fetch_size(),
            default_fetch_size: default_default_fetch_size(),
            max_fetch_size: default_max_fetch_size(),
            memory_capacity_ratio: default_memory_capacity_ratio(),
            estimated_record_overhead_bytes: default_overhead_bytes(),
            estimated_field_overhead_bytes: default_overhead_bytes(),
            max_memory_bytes_for_testing: None,
            limit_policy: LimitPolicy::default(),
        }
    }
}

impl ExtractConstants {
    /// Effective memory budget
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_bytes_for_testing
            .unwrap_or(DEFAULT_MAX_MEMORY_BYTES)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.memory_capacity_ratio > 0.0 && self.memory_capacity_ratio <= 1.0) {
            return Err(Error::invalid_config(
                "memory_capacity_ratio",
                format!("must be in (0, 1], got {}", self.memory_capacity_ratio),
            ));
        }
        if self.min_fetch_size > self.default_fetch_size
            || self.default_fetch_size > self.max_fetch_size
        {
            return Err(Error::invalid_config(
                "default_fetch_size",
                format!(
                    "expected {} <= {} <= {}",
                    self.min_fetch_size, self.default_fetch_size, self.max_fetch_size
                ),
            ));
        }
        if self.max_sample_size == 0 {
            return Err(Error::invalid_config(
                "max_sample_size",
                "must be at least 1",
            ));
        }
        self.limit_policy.validate()
    }
}

// ============================================================================
// Limit Policy
// ============================================================================

/// Bounds and step factor for the adaptive resumable read limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPolicy {
    #[serde(default = "default_limit_initial")]
    pub initial: u64,
    #[serde(default = "default_limit_minimum")]
    pub minimum: u64,
    #[serde(default = "default_limit_maximum")]
    pub maximum: u64,
    #[serde(default = "default_limit_factor")]
    pub factor: u64,
}

fn default_limit_initial() -> u64 {
    1 << 14
}

fn default_limit_minimum() -> u64 {
    1 << 3
}

fn default_limit_maximum() -> u64 {
    1 << 30
}

fn default_limit_factor() -> u64 {
    2
}

impl Default for LimitPolicy {
    fn default() -> Self {
        Self {
            initial: default_limit_initial(),
            minimum: default_limit_minimum(),
            maximum: default_limit_maximum(),
            factor: default_limit_factor(),
        }
    }
}

impl LimitPolicy {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.minimum == 0 || self.minimum > self.initial || self.initial > self.maximum {
            return Err(Error::invalid_config(
                "limit_policy",
                format!(
                    "expected 0 < {} <= {} <= {}",
                    self.minimum, self.initial, self.maximum
                ),
            ));
        }
        if self.factor < 2 {
            return Err(Error::invalid_config(
                "limit_policy.factor",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}
