//! Watcher errors and non-fatal warnings.

use std::path::PathBuf;

use serde::Serialize;
use strum::Display;
use thiserror::Error;

/// Errors that prevent a watch session from starting.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The root is missing or not a directory.
    #[error("Cannot watch {path}: not a directory")]
    NotADirectory { path: PathBuf },

    /// The backend could not be created or could not watch the root.
    #[error("Failed to watch {path}: {source}")]
    Backend {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The setup task failed.
    #[error("Watcher setup failed: {message}")]
    Setup { message: String },
}

impl WatchError {
    /// Create a backend error with path context.
    pub fn backend(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        Self::Backend {
            path: path.into(),
            source,
        }
    }
}

/// Kind of watch warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WatchWarningKind {
    /// The OS ran out of file handles or watch slots.
    ResourceExhausted,
    /// The configured watch limit was reached.
    LimitReached,
    /// A backend reported an error for one path.
    BackendError,
}

/// Non-fatal problem reported to the caller. Watching continues with
/// reduced coverage.
#[derive(Debug, Clone, Serialize)]
pub struct WatchWarning {
    /// Path involved, if any.
    pub path: Option<PathBuf>,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WatchWarningKind,
}

impl WatchWarning {
    /// Create a new watch warning.
    pub fn new(path: Option<PathBuf>, message: impl Into<String>, kind: WatchWarningKind) -> Self {
        Self {
            path,
            message: message.into(),
            kind,
        }
    }

    /// Map a notify error to a warning.
    pub fn from_notify(path: Option<PathBuf>, error: &notify::Error) -> Self {
        let path = path.or_else(|| error.paths.first().cloned());
        if is_resource_exhaustion(error) {
            Self::new(
                path,
                format!("File watching limited, system resources exhausted: {error}"),
                WatchWarningKind::ResourceExhausted,
            )
        } else {
            Self::new(path, error.to_string(), WatchWarningKind::BackendError)
        }
    }

    /// Create a warning for the configured watch limit.
    pub fn limit_reached(limit: usize) -> Self {
        Self::new(
            None,
            format!("Watch limit of {limit} directories reached, deeper changes may be missed"),
            WatchWarningKind::LimitReached,
        )
    }
}

// EMFILE, ENFILE and ENOSPC (inotify watch limit) on unix-like systems.
const EXHAUSTION_ERRNOS: &[i32] = &[24, 23, 28];

/// Check whether an error means the OS refused more handles.
pub fn is_resource_exhaustion(error: &notify::Error) -> bool {
    match &error.kind {
        notify::ErrorKind::MaxFilesWatch => true,
        notify::ErrorKind::Io(io) => io
            .raw_os_error()
            .is_some_and(|code| EXHAUSTION_ERRNOS.contains(&code)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhaustion_detection() {
        let max = notify::Error::new(notify::ErrorKind::MaxFilesWatch);
        assert!(is_resource_exhaustion(&max));

        let emfile = notify::Error::io(std::io::Error::from_raw_os_error(24));
        assert!(is_resource_exhaustion(&emfile));

        let missing = notify::Error::path_not_found();
        assert!(!is_resource_exhaustion(&missing));
    }

    #[test]
    fn test_warning_from_notify() {
        let err = notify::Error::new(notify::ErrorKind::MaxFilesWatch).add_path("/p/a".into());
        let warning = WatchWarning::from_notify(None, &err);
        assert_eq!(warning.kind, WatchWarningKind::ResourceExhausted);
        assert_eq!(warning.path, Some(PathBuf::from("/p/a")));

        let generic = notify::Error::generic("boom");
        let warning = WatchWarning::from_notify(None, &generic);
        assert_eq!(warning.kind, WatchWarningKind::BackendError);
    }
}
