//! Watcher capability and its native and polling implementations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};
use notify::{Config, PollWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use filescope_core::{WatchConfig, normalize_path};

use crate::error::{WatchError, WatchWarning, is_resource_exhaustion};
use crate::filter::EventFilter;

/// Raw notifications from a backend.
pub type RawEvent = notify::Result<notify::Event>;

/// Sender half for raw notifications.
pub type RawEventSender = mpsc::Sender<RawEvent>;

/// A way of receiving filesystem notifications for a root.
pub trait Watcher: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Deepest directory level below the root whose events are delivered.
    fn max_depth(&self) -> usize;

    /// Begin watching `root`, sending raw notifications to `events`.
    ///
    /// Blocking; call from a blocking context.
    fn watch(
        &self,
        root: &Path,
        filter: &EventFilter,
        events: RawEventSender,
    ) -> Result<WatchHandle, WatchError>;
}

/// Live backend registration. Dropping it releases every OS handle.
pub struct WatchHandle {
    backend: &'static str,
    watcher: Box<dyn notify::Watcher + Send>,
    watched: Vec<PathBuf>,
    warnings: Vec<WatchWarning>,
    limit: usize,
    limit_reported: bool,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("backend", &self.backend)
            .field("watched", &self.watched.len())
            .field("limit", &self.limit)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl WatchHandle {
    /// Register `directories` one level each, stopping at `limit` or when the
    /// OS runs out of handles.
    fn register(
        backend: &'static str,
        mut watcher: Box<dyn notify::Watcher + Send>,
        root: &Path,
        mut directories: Vec<PathBuf>,
        limit: usize,
    ) -> Result<Self, WatchError> {
        let mut warnings = Vec::new();
        let limit_reported = directories.len() > limit;
        if limit_reported {
            directories.truncate(limit);
            warn!(root = %root.display(), limit, "watch limit reached");
            warnings.push(WatchWarning::limit_reached(limit));
        }

        let mut watched = Vec::with_capacity(directories.len());
        for dir in directories {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => watched.push(dir),
                Err(err) if is_resource_exhaustion(&err) => {
                    warn!(path = %dir.display(), error = %err, "out of watch handles, stopping");
                    warnings.push(WatchWarning::from_notify(Some(dir), &err));
                    break;
                }
                Err(err) => {
                    debug!(path = %dir.display(), error = %err, "failed to watch directory");
                }
            }
        }

        if watched.is_empty() {
            return Err(WatchError::Setup {
                message: format!("no directories under {} could be watched", root.display()),
            });
        }

        info!(root = %root.display(), backend, directories = watched.len(), "watcher started");
        Ok(Self {
            backend,
            watcher,
            watched,
            warnings,
            limit,
            limit_reported,
        })
    }

    /// Backend that produced this handle.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Number of low-level watches held.
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    /// Directories currently registered.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Warnings raised while registering watches.
    pub fn take_warnings(&mut self) -> Vec<WatchWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Register a directory that appeared after the session started.
    ///
    /// Returns a warning the first time the watch limit stops a
    /// registration, and whenever the OS refuses one.
    pub fn add_directory(&mut self, dir: &Path) -> Option<WatchWarning> {
        if self.watched.iter().any(|watched| watched == dir) {
            return None;
        }
        if self.watched.len() >= self.limit {
            if self.limit_reported {
                return None;
            }
            self.limit_reported = true;
            warn!(path = %dir.display(), limit = self.limit, "watch limit reached");
            return Some(WatchWarning::limit_reached(self.limit));
        }

        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!(path = %dir.display(), "watching new directory");
                self.watched.push(dir.to_path_buf());
                None
            }
            Err(err) if is_resource_exhaustion(&err) => {
                warn!(path = %dir.display(), error = %err, "out of watch handles");
                Some(WatchWarning::from_notify(Some(dir.to_path_buf()), &err))
            }
            Err(err) => {
                debug!(path = %dir.display(), error = %err, "failed to watch new directory");
                None
            }
        }
    }

    /// Unregister every watch.
    pub fn close(mut self) {
        for path in self.watched.drain(..) {
            if let Err(err) = self.watcher.unwatch(&path) {
                debug!(path = %path.display(), error = %err, "unwatch failed");
            }
        }
        debug!(backend = self.backend, "watch handle closed");
    }
}

fn forward(events: RawEventSender) -> impl Fn(RawEvent) + Send + 'static {
    move |event| {
        // Receiver gone means the session is closing.
        let _ = events.blocking_send(event);
    }
}

/// Directories to register under `root`, root first, in name order.
///
/// Bounded by depth, per-directory fan-out and the filter; yields at most
/// `limit + 1` entries so the caller can tell the limit was hit.
pub fn discover_directories(
    root: &Path,
    filter: &EventFilter,
    max_depth: usize,
    max_subdirectories: usize,
    limit: usize,
) -> Vec<PathBuf> {
    let walk_filter = filter.clone();

    WalkDir::new(root)
        .parallelism(Parallelism::Serial)
        .sort(true)
        .skip_hidden(false)
        .max_depth(max_depth)
        .process_read_dir(move |depth, _path, _state, children| {
            // The root itself arrives with no depth.
            if depth.is_none() {
                return;
            }
            children.retain(|child| {
                child.as_ref().is_ok_and(|entry| {
                    entry.file_type.is_dir()
                        && walk_filter.accepts(&normalize_path(entry.path()), true)
                })
            });
            children.truncate(max_subdirectories);
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type.is_dir())
        .map(|entry| entry.path())
        .take(limit.saturating_add(1))
        .collect()
}

/// OS notifications (inotify, FSEvents, ReadDirectoryChangesW), one
/// non-recursive registration per directory down to the depth bound.
///
/// Ignored directories never get a watch, so heavy trees like
/// `node_modules` cost no OS handles.
#[derive(Debug, Clone)]
pub struct NativeWatcher {
    max_depth: usize,
    max_watchers: usize,
}

impl NativeWatcher {
    /// Create a native watcher from configuration.
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            max_depth: config.native_max_depth,
            max_watchers: config.max_watchers,
        }
    }
}

impl Watcher for NativeWatcher {
    fn name(&self) -> &'static str {
        "native"
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn watch(
        &self,
        root: &Path,
        filter: &EventFilter,
        events: RawEventSender,
    ) -> Result<WatchHandle, WatchError> {
        let watcher = notify::recommended_watcher(forward(events))
            .map_err(|e| WatchError::backend(root, e))?;
        let directories =
            discover_directories(root, filter, self.max_depth, usize::MAX, self.max_watchers);
        WatchHandle::register(self.name(), Box::new(watcher), root, directories, self.max_watchers)
    }
}

/// Periodic rescans with one non-recursive watch per directory, for
/// filesystems where OS notifications are unavailable or unreliable.
#[derive(Debug, Clone)]
pub struct PollingWatcher {
    max_depth: usize,
    max_subdirectories: usize,
    max_watchers: usize,
    interval: Duration,
}

impl PollingWatcher {
    /// Create a polling watcher from configuration.
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            max_depth: config.polling_max_depth,
            max_subdirectories: config.polling_max_subdirectories,
            max_watchers: config.max_watchers,
            interval: config.poll_interval,
        }
    }

    /// Directories to register, root first, bounded by depth, per-level
    /// fan-out and the filter.
    pub fn discover(&self, root: &Path, filter: &EventFilter) -> Vec<PathBuf> {
        discover_directories(
            root,
            filter,
            self.max_depth,
            self.max_subdirectories,
            self.max_watchers,
        )
    }
}

impl Watcher for PollingWatcher {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn watch(
        &self,
        root: &Path,
        filter: &EventFilter,
        events: RawEventSender,
    ) -> Result<WatchHandle, WatchError> {
        let config = Config::default()
            .with_poll_interval(self.interval)
            .with_compare_contents(false);
        let watcher =
            PollWatcher::new(forward(events), config).map_err(|e| WatchError::backend(root, e))?;
        let directories = self.discover(root, filter);
        WatchHandle::register(self.name(), Box::new(watcher), root, directories, self.max_watchers)
    }
}
