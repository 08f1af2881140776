//! Error types for registry synchronization
//!
//! Only setup and configuration failures surface as [`SyncError`] to the
//! caller of a run. Per-artifact failures are resolved inside the worker
//! loop and end up in the failed or corrupted queues instead.

pub mod handlers;

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Credentials rejected or registry not writable
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Registry answered with an unexpected status or payload
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoPlain(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Artifact format with no transfer behavior
    #[error("Unsupported artifact format: {format}")]
    UnsupportedFormat { format: String },

    /// Registry metadata missing a field the classifier needs
    #[error("Invalid asset metadata: {0}")]
    InvalidAsset(String),

    #[error("Not enough space on disk to sync assets: required {required} bytes, available {available} bytes")]
    InsufficientDiskSpace { required: u64, available: u64 },

    /// A single transfer attempt failed
    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Shared counters no longer pair up with the queued work
    #[error("Counter drift: {0}")]
    CounterDrift(String),
}

impl SyncError {
    /// Attach the offending path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that abort the run because the input itself is wrong
    pub fn is_configuration_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_)
                | SyncError::UnsupportedFormat { .. }
                | SyncError::InvalidAsset(_)
        )
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Configuration(format!("Invalid URL: {}", err))
    }
}
