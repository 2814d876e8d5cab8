//! Path filtering and raw event classification.

use std::path::Path;
use std::sync::Arc;

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use filescope_core::{WatchEventKind, relative_path};
use filescope_ignore::{LOCAL_PATTERN_FILE, Matcher};

/// Decides which paths under a root produce events.
#[derive(Debug, Clone)]
pub struct EventFilter {
    matcher: Arc<Matcher>,
    always_ignored: Arc<[String]>,
    max_depth: usize,
}

impl EventFilter {
    /// Create a filter for the matcher's root.
    pub fn new(matcher: Arc<Matcher>, always_ignored: &[String], max_depth: usize) -> Self {
        Self {
            matcher,
            always_ignored: always_ignored.into(),
            max_depth,
        }
    }

    /// Normalized root.
    pub fn root(&self) -> &str {
        self.matcher.root()
    }

    /// Same filter with a different depth bound.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Check a normalized path below the root.
    ///
    /// Files matched by a pattern pass, since scans list them as excluded
    /// entries. Anything inside an excluded directory does not. The root's
    /// local pattern file passes despite being hidden.
    pub fn accepts(&self, path: &str, is_dir: bool) -> bool {
        let Some(relative) = relative_path(self.matcher.root(), path) else {
            return false;
        };
        if !is_dir && relative == LOCAL_PATTERN_FILE {
            return true;
        }

        let components: Vec<&str> = relative.split('/').collect();
        let dirs = if is_dir {
            &components[..]
        } else {
            &components[..components.len() - 1]
        };
        if dirs.len() > self.max_depth {
            return false;
        }
        if dirs.iter().any(|c| self.always_ignored.iter().any(|i| i == c)) {
            return false;
        }
        if components
            .iter()
            .any(|c| c.starts_with('.') && *c != ".gitignore")
        {
            return false;
        }

        if is_dir {
            return !self.matcher.is_excluded(relative, true);
        }
        match relative.rsplit_once('/') {
            Some((parent, _)) => !self.matcher.is_excluded(parent, true),
            None => true,
        }
    }
}

/// Map a raw notification to a delivered kind for one of its paths.
///
/// Renames and unspecific kinds are resolved by checking whether the path
/// still exists. Directory events and pure accesses yield `None`.
pub fn classify_raw(kind: &EventKind, path: &Path) -> Option<WatchEventKind> {
    let metadata = std::fs::symlink_metadata(path).ok();
    if metadata.as_ref().is_some_and(|m| m.is_dir()) {
        return None;
    }
    let exists = metadata.is_some();

    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => exists.then_some(WatchEventKind::Add),
        EventKind::Remove(_) => Some(WatchEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(WatchEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(_)) => Some(if exists {
            WatchEventKind::Add
        } else {
            WatchEventKind::Delete
        }),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(if exists {
            WatchEventKind::Change
        } else {
            WatchEventKind::Delete
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};
    use std::fs;
    use tempfile::TempDir;

    fn filter(patterns: &[&str], max_depth: usize) -> EventFilter {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        let always: Vec<String> = ["node_modules", ".git", "dist", "build"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        EventFilter::new(Arc::new(Matcher::build("/p", &patterns)), &always, max_depth)
    }

    #[test]
    fn test_always_ignored_directories() {
        let filter = filter(&[], 5);
        assert!(filter.accepts("/p/src/a.ts", false));
        assert!(!filter.accepts("/p/node_modules/x/y.js", false));
        assert!(!filter.accepts("/p/pkg/dist/out.js", false));
        // Only directory components count
        assert!(filter.accepts("/p/src/build", false));
    }

    #[test]
    fn test_patterns_and_hidden() {
        let filter = filter(&["*.py", "generated/"], 5);
        assert!(!filter.accepts("/p/generated", true));
        assert!(!filter.accepts("/p/generated/out.ts", false));
        assert!(!filter.accepts("/p/.env", false));
        assert!(filter.accepts("/p/.gitignore", false));
        assert!(!filter.accepts("/elsewhere/a.ts", false));
        assert!(!filter.accepts("/p", true));
    }

    #[test]
    fn test_excluded_files_still_pass() {
        let filter = filter(&["*.py"], 5);
        assert!(filter.accepts("/p/app.py", false));
        assert!(filter.accepts("/p/src/tool.py", false));
    }

    #[test]
    fn test_local_pattern_file_passes_at_root_only() {
        let filter = filter(&[], 5);
        assert!(filter.accepts("/p/.repo_ignore", false));
        assert!(!filter.accepts("/p/src/.repo_ignore", false));
        assert!(!filter.accepts("/p/.repo_ignore", true));
    }

    #[test]
    fn test_depth_bound() {
        let filter = filter(&[], 2);
        assert!(filter.accepts("/p/a/b/c.ts", false));
        assert!(!filter.accepts("/p/a/b/c/d.ts", false));
    }

    #[test]
    fn test_classify_raw() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        let gone = temp.path().join("gone.txt");

        let create = EventKind::Create(CreateKind::File);
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Any));

        assert_eq!(classify_raw(&create, &file), Some(WatchEventKind::Add));
        assert_eq!(classify_raw(&create, &gone), None);
        assert_eq!(classify_raw(&modify, &file), Some(WatchEventKind::Change));
        assert_eq!(classify_raw(&modify, &gone), Some(WatchEventKind::Delete));
        assert_eq!(classify_raw(&rename, &file), Some(WatchEventKind::Add));
        assert_eq!(classify_raw(&rename, &gone), Some(WatchEventKind::Delete));
        assert_eq!(
            classify_raw(&EventKind::Remove(RemoveKind::File), &gone),
            Some(WatchEventKind::Delete)
        );
        assert_eq!(classify_raw(&EventKind::Access(AccessKind::Any), &file), None);
        assert_eq!(classify_raw(&create, temp.path()), None);
    }
}
