use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// =============================================================================
// Feed-related constants
// =============================================================================

/// Default CouchDB replication endpoint of the npm registry
pub const DEFAULT_REGISTRY_URL: &str = "https://replicate.npmjs.com";

/// Default number of change events the transport may buffer ahead of the consumer
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 1;

/// Default `_changes` page size
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Delay before polling again once the feed is caught up (1 second)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

// =============================================================================
// Rotation-related constants
// =============================================================================

/// Sorted logs larger than this are split into shards (100 MiB)
pub const DEFAULT_SHARD_SIZE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Number of records per shard when a sorted log is split
pub const DEFAULT_SHARD_LINES: usize = 10_000_000;

/// Number of records sorted in memory at once before spilling a run to disk
pub const DEFAULT_SORT_CHUNK_LINES: usize = 1_000_000;

/// Collector configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectorConfig {
    pub registry: RegistryConfig,
    pub rotation: RotationConfig,
    /// Exclusive upper bound of the feed sequence; fetched from the registry when absent
    pub end_sequence: Option<u64>,
}

/// Change feed configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub url: String,
    pub prefetch_concurrency: usize,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Event log post-processing configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RotationConfig {
    pub size_threshold_bytes: u64,
    pub shard_lines: usize,
    pub sort_chunk_lines: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: DEFAULT_SHARD_SIZE_THRESHOLD,
            shard_lines: DEFAULT_SHARD_LINES,
            sort_chunk_lines: DEFAULT_SORT_CHUNK_LINES,
        }
    }
}

impl CollectorConfig {
    /// Loads the configuration from a JSON file, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_json::from_str(&content)?)
    }
}

/// Locations of every file the collector reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scalar file holding the last persisted feed sequence
    pub fn sequence_path(&self) -> PathBuf {
        self.root.join("sequence")
    }

    /// `name,version` file holding the last processed version per package
    pub fn last_versions_path(&self) -> PathBuf {
        self.root.join("last_versions.csv")
    }

    /// Marker naming an active log that still has to be rotated
    pub fn pending_rotation_path(&self) -> PathBuf {
        self.root.join("pending_rotation")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("npm-dep-events.log")
    }
}

/// Returns the path to the data directory for npm-dep-events.
/// Uses $XDG_DATA_HOME/npm-dep-events if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/npm-dep-events,
/// or ./npm-dep-events if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("npm-dep-events")
}
