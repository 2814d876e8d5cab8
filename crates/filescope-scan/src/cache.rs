//! Per-root TTL cache of scan results.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use filescope_core::{Clock, FileEntry, SystemClock, is_within, normalize_path};

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    files: Vec<FileEntry>,
}

/// Scan results keyed by normalized root path.
///
/// Expiry is checked on read; there is no background sweep.
#[derive(Debug)]
pub struct DirectoryCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, CacheEntry>,
}

impl DirectoryCache {
    /// Create a cache on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache on a specific clock.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: DashMap::new(),
        }
    }

    /// Time-to-live of every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached files for `root`, unless absent or expired.
    pub fn get(&self, root: &str) -> Option<Vec<FileEntry>> {
        let key = normalize_path(root);
        let now = self.clock.now();

        let expired = match self.entries.get(&key) {
            Some(entry) if now.duration_since(entry.stored_at) <= self.ttl => {
                trace!(root = %key, files = entry.files.len(), "cache hit");
                return Some(entry.files.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!(root = %key, "evicting expired cache entry");
            self.entries
                .remove_if(&key, |_, entry| now.duration_since(entry.stored_at) > self.ttl);
        }
        None
    }

    /// Store files for `root`, replacing any previous entry.
    pub fn set(&self, root: &str, files: Vec<FileEntry>) {
        let key = normalize_path(root);
        trace!(root = %key, files = files.len(), "caching scan result");
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: self.clock.now(),
                files,
            },
        );
    }

    /// Drop one root, or everything.
    pub fn clear(&self, root: Option<&str>) {
        match root {
            Some(root) => {
                self.entries.remove(&normalize_path(root));
            }
            None => self.entries.clear(),
        }
    }

    /// Replace or insert one file in every snapshot whose root contains it.
    ///
    /// Does not refresh the entry's timestamp.
    pub fn upsert_file(&self, file: &FileEntry) {
        for mut entry in self.entries.iter_mut() {
            if !is_within(entry.key(), &file.path) {
                continue;
            }
            match entry.files.iter_mut().find(|f| f.path == file.path) {
                Some(existing) => *existing = file.clone(),
                None => entry.files.push(file.clone()),
            }
        }
    }

    /// Remove `path` and everything below it from every snapshot.
    pub fn remove_path(&self, path: &str) {
        for mut entry in self.entries.iter_mut() {
            entry.files.retain(|f| !is_within(path, &f.path));
        }
    }

    /// Number of stored roots, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filescope_core::ManualClock;
    use std::time::SystemTime;

    fn entry(path: &str) -> FileEntry {
        let name = path.rsplit('/').next().unwrap();
        FileEntry::new_text(path, name, 1, SystemTime::UNIX_EPOCH, 1, None)
    }

    #[test]
    fn test_expiry_is_lazy() {
        let clock = Arc::new(ManualClock::new());
        let cache = DirectoryCache::with_clock(Duration::from_secs(10), clock.clone());
        cache.set("/p", vec![entry("/p/a.ts")]);

        clock.advance(Duration::from_secs(10));
        assert!(cache.get("/p").is_some());
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("/p").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_is_normalized() {
        let cache = DirectoryCache::new(Duration::from_secs(60));
        cache.set("/p/sub/..", vec![entry("/p/a.ts")]);
        assert!(cache.get("/p/").is_some());
    }

    #[test]
    fn test_upsert_and_remove() {
        let cache = DirectoryCache::new(Duration::from_secs(60));
        cache.set("/p", vec![entry("/p/a.ts"), entry("/p/dir/b.ts")]);
        cache.set("/q", vec![entry("/q/c.ts")]);

        let mut changed = entry("/p/a.ts");
        changed.size = 99;
        cache.upsert_file(&changed);
        cache.upsert_file(&entry("/p/new.ts"));

        let files = cache.get("/p").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].size, 99);
        assert_eq!(cache.get("/q").unwrap().len(), 1);

        cache.remove_path("/p/dir");
        let paths: Vec<_> = cache.get("/p").unwrap().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["/p/a.ts", "/p/new.ts"]);
    }
}
