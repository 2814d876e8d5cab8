//! Error types for scanning operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Path lies outside the scanned root.
    #[error("Path {path} is outside of root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// Operation was cancelled.
    #[error("Scan cancelled")]
    Cancelled,

    /// The scan did not finish in time.
    #[error(
        "Scan timed out after {seconds} seconds. The directory may be too large; \
         try a smaller directory or add ignore patterns."
    )]
    TimedOut { seconds: u64 },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory listing.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// A directory had too many entries and was abandoned.
    DirectoryTooLarge,
    /// A structural limit truncated the scan.
    LimitReached,
}

/// Non-fatal warning encountered during scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a directory listing that could not be read.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        let kind = if error.kind() == std::io::ErrorKind::PermissionDenied {
            WarningKind::PermissionDenied
        } else {
            WarningKind::ReadError
        };
        Self {
            message: format!("Read error: {error}"),
            path,
            kind,
        }
    }

    /// Create a warning for an oversized directory.
    pub fn directory_too_large(path: impl Into<PathBuf>, limit: usize) -> Self {
        let path = path.into();
        Self {
            message: format!(
                "Directory {} has more than {limit} entries, skipped",
                path.display()
            ),
            path,
            kind: WarningKind::DirectoryTooLarge,
        }
    }

    /// Create a warning for a limit that truncated the scan.
    pub fn limit_reached(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(path, message, WarningKind::LimitReached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_io() {
        let err = ScanError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ScanError::PermissionDenied { .. }));
    }

    #[test]
    fn test_timeout_message_has_hint() {
        let err = ScanError::TimedOut { seconds: 120 };
        let message = err.to_string();
        assert!(message.contains("120 seconds"));
        assert!(message.contains("smaller directory"));
    }

    #[test]
    fn test_read_error_warning_kind() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let warning = ScanWarning::read_error("/secret", &denied);
        assert_eq!(warning.kind, WarningKind::PermissionDenied);

        let other = std::io::Error::other("boom");
        let warning = ScanWarning::read_error("/broken", &other);
        assert_eq!(warning.kind, WarningKind::ReadError);
    }
}
