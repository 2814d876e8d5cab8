//! The engine's live view of the current root's files.

use indexmap::IndexMap;
use parking_lot::RwLock;

use filescope_core::{FileEntry, is_within};

#[derive(Debug, Default)]
struct Inner {
    root: Option<String>,
    files: IndexMap<String, FileEntry>,
}

/// Files of the most recently loaded root, keyed by normalized path.
///
/// Scans replace it wholesale; watcher events patch it.
#[derive(Debug, Default)]
pub struct ActiveFiles {
    inner: RwLock<Inner>,
}

impl ActiveFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a fresh listing of `root`.
    pub fn replace(&self, root: &str, files: Vec<FileEntry>) {
        let files = files.into_iter().map(|f| (f.path.clone(), f)).collect();
        *self.inner.write() = Inner {
            root: Some(root.to_string()),
            files,
        };
    }

    /// Root the set belongs to.
    pub fn root(&self) -> Option<String> {
        self.inner.read().root.clone()
    }

    /// Insert or replace one entry. Entries outside the root are ignored.
    pub fn upsert(&self, entry: FileEntry) -> bool {
        let mut inner = self.inner.write();
        let inside = inner
            .root
            .as_deref()
            .is_some_and(|root| is_within(root, &entry.path));
        if inside {
            inner.files.insert(entry.path.clone(), entry);
        }
        inside
    }

    /// Remove `path` and everything below it. Returns how many entries went.
    pub fn remove(&self, path: &str) -> usize {
        let mut inner = self.inner.write();
        let before = inner.files.len();
        inner.files.retain(|key, _| !is_within(path, key));
        before - inner.files.len()
    }

    /// Look up one entry.
    pub fn get(&self, path: &str) -> Option<FileEntry> {
        self.inner.read().files.get(path).cloned()
    }

    /// Copy of every entry in insertion order.
    pub fn snapshot(&self) -> Vec<FileEntry> {
        self.inner.read().files.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().files.is_empty()
    }

    /// Forget the root and its files.
    pub fn clear(&self) {
        *self.inner.write() = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn entry(path: &str) -> FileEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        FileEntry::new_text(path, name, 1, SystemTime::UNIX_EPOCH, 1, None)
    }

    #[test]
    fn test_upsert_and_remove() {
        let active = ActiveFiles::new();
        active.replace("/p", vec![entry("/p/a.ts"), entry("/p/src/b.ts")]);

        assert!(active.upsert(entry("/p/src/c.ts")));
        assert!(!active.upsert(entry("/elsewhere/d.ts")));
        assert_eq!(active.len(), 3);

        assert_eq!(active.remove("/p/src"), 2);
        assert_eq!(active.snapshot(), vec![entry("/p/a.ts")]);
    }

    #[test]
    fn test_replace_resets() {
        let active = ActiveFiles::new();
        active.replace("/p", vec![entry("/p/a.ts")]);
        active.replace("/q", Vec::new());
        assert_eq!(active.root().as_deref(), Some("/q"));
        assert!(active.get("/p/a.ts").is_none());

        active.clear();
        assert!(active.root().is_none());
        assert!(active.is_empty());
    }
}
