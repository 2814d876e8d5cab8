//! Refusal to scan the application's own installation.

use std::path::Path;

use filescope_core::normalize_path;
use tracing::debug;

/// Detects scan roots that point at the running application.
#[derive(Debug, Clone, Default)]
pub struct AppDirectoryGuard {
    app_dir: Option<String>,
    parent: Option<String>,
}

impl AppDirectoryGuard {
    /// Guard a specific directory and its parent.
    pub fn new(app_dir: impl AsRef<Path>) -> Self {
        let app_dir = app_dir.as_ref();
        Self {
            app_dir: Some(normalize_path(app_dir)),
            parent: app_dir.parent().map(normalize_path),
        }
    }

    /// Guard the directory of the current executable, if it can be found.
    pub fn detect() -> Self {
        match std::env::current_exe() {
            Ok(exe) => match exe.parent() {
                Some(dir) => Self::new(dir),
                None => Self::default(),
            },
            Err(err) => {
                debug!(error = %err, "cannot locate current executable, app directory guard disabled");
                Self::default()
            }
        }
    }

    /// Guard from configuration, falling back to detection.
    pub fn from_config(app_directory: Option<&Path>) -> Self {
        match app_directory {
            Some(dir) => Self::new(dir),
            None => Self::detect(),
        }
    }

    /// Guarded application directory.
    pub fn app_dir(&self) -> Option<&str> {
        self.app_dir.as_deref()
    }

    /// Check a normalized root.
    pub fn is_guarded(&self, root: &str) -> bool {
        self.app_dir.as_deref() == Some(root) || self.parent.as_deref() == Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_dir_and_parent_only() {
        let guard = AppDirectoryGuard::new("/opt/tool/bin");
        assert!(guard.is_guarded("/opt/tool/bin"));
        assert!(guard.is_guarded("/opt/tool"));
        assert!(!guard.is_guarded("/opt"));
        assert!(!guard.is_guarded("/opt/tool/bin/sub"));
    }

    #[test]
    fn test_default_guards_nothing() {
        assert!(!AppDirectoryGuard::default().is_guarded("/"));
    }
}
