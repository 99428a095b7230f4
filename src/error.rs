use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Change feed closed before the end sequence was reached")]
    Closed,
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt sequence file {path:?}: {value:?}")]
    CorruptSequence { path: PathBuf, value: String },
}

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("Rotation I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not an active event log: {0:?}")]
    UnexpectedName(PathBuf),
}

/// Run-level failure of a collection run
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Rotate(#[from] RotateError),

    #[error("Event log I/O error on {path:?}: {source}")]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },
}
