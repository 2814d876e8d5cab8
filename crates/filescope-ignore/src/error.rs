//! Pattern error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or saving pattern files.
#[derive(Debug, Error)]
pub enum PatternError {
    /// Reading or writing a pattern file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local patterns were requested without a root.
    #[error("Local patterns need a project root")]
    MissingRoot,

    /// The pattern is not one of the system patterns.
    #[error("Unknown system pattern: {pattern}")]
    UnknownSystemPattern { pattern: String },
}

impl PatternError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
