//! Engine error type.

use thiserror::Error;

use filescope_core::ScanError;
use filescope_ignore::PatternError;
use filescope_watch::WatchError;

/// Errors returned by [`IndexingEngine`](crate::IndexingEngine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Scanning or reading a file failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Loading or saving patterns failed.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The watcher could not be started.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// A background task panicked or was aborted.
    #[error("Background task failed: {message}")]
    Task { message: String },

    /// The engine stopped before replying.
    #[error("Engine is no longer running")]
    Closed,
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            message: err.to_string(),
        }
    }
}
