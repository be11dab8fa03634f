//! Error types for the track logger

use std::path::PathBuf;

/// Result type alias for tracker setup and shutdown
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure to obtain a station snapshot for one cycle
///
/// Never escapes the fetcher: the polling loop turns it into an empty snapshot.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The metadata endpoint could not be reached or answered badly
    #[error("metadata source failed: {0}")]
    Source(#[from] pmoantenne::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Failure to persist a batch of track events
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// The blocking writer task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors that stop the tracker process
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// The allow-list file exists but could not be read
    #[error("Cannot read station list {path}: {source}")]
    Stations {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Metadata client error: {0}")]
    Client(#[from] pmoantenne::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
