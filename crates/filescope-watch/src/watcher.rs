//! Watch sessions: one backend registration plus a debouncing event loop.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::EventKind;
use notify::event::ModifyKind;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use filescope_core::{WatchConfig, WatchEvent, WatchEventKind, normalize_path};
use filescope_ignore::Matcher;

use crate::backend::{NativeWatcher, PollingWatcher, RawEvent, WatchHandle, Watcher};
use crate::debounce::Debouncer;
use crate::error::{WatchError, WatchWarning, is_resource_exhaustion};
use crate::filter::{EventFilter, classify_raw};

const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// Something the watcher reports to its caller.
#[derive(Debug, Clone)]
pub enum WatchNotice {
    /// A debounced change.
    Event(WatchEvent),
    /// Coverage was reduced.
    Warning(WatchWarning),
}

/// Result of starting a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatus {
    /// Normalized root.
    pub root: String,
    /// Backend in use.
    pub backend: &'static str,
    /// Low-level watches registered.
    pub watched_paths: usize,
    /// Problems hit while registering.
    pub warnings: Vec<WatchWarning>,
}

struct WatchSession {
    root: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchSession {
    async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Err(err) = (&mut self.task).await {
            debug!(root = %self.root, error = %err, "watch task ended abnormally");
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Debounced, filtered file watching for one root at a time.
pub struct FileWatcher {
    backend: Arc<dyn Watcher>,
    config: WatchConfig,
    session: Mutex<Option<WatchSession>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Create a watcher on a specific backend.
    pub fn new(backend: Arc<dyn Watcher>, config: WatchConfig) -> Self {
        Self {
            backend,
            config,
            session: Mutex::new(None),
        }
    }

    /// Watcher on OS notifications.
    pub fn native(config: WatchConfig) -> Self {
        Self::new(Arc::new(NativeWatcher::new(&config)), config)
    }

    /// Watcher on the polling backend.
    pub fn polling(config: WatchConfig) -> Self {
        Self::new(Arc::new(PollingWatcher::new(&config)), config)
    }

    /// Name of the backend in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Watch configuration.
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Start watching `root`, closing any previous session first.
    ///
    /// Debounced events and runtime warnings are sent to `sink` until the
    /// session is closed or `sink` is dropped.
    pub async fn start(
        &self,
        root: &Path,
        matcher: Arc<Matcher>,
        sink: mpsc::Sender<WatchNotice>,
    ) -> Result<WatchStatus, WatchError> {
        let mut session = self.session.lock().await;
        if let Some(mut previous) = session.take() {
            debug!(root = %previous.root, "closing previous watch session");
            previous.shutdown().await;
        }

        if !root.is_dir() {
            return Err(WatchError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        let root_norm = normalize_path(root);
        let filter = EventFilter::new(
            matcher,
            &self.config.always_ignored,
            self.backend.max_depth(),
        );
        let (raw_tx, raw_rx) = mpsc::channel(self.config.channel_size);

        let backend = Arc::clone(&self.backend);
        let watch_root = root.to_path_buf();
        let setup_filter = filter.clone();
        let mut handle =
            tokio::task::spawn_blocking(move || backend.watch(&watch_root, &setup_filter, raw_tx))
                .await
                .map_err(|e| WatchError::Setup {
                    message: e.to_string(),
                })??;

        let status = WatchStatus {
            root: root_norm.clone(),
            backend: handle.backend(),
            watched_paths: handle.watched_count(),
            warnings: handle.take_warnings(),
        };

        let cancel = CancellationToken::new();
        let event_loop = EventLoop {
            filter,
            debouncer: Debouncer::new(self.config.debounce),
            sizes: HashMap::new(),
            await_write_finish: self.config.await_write_finish,
            sink,
        };
        let task = tokio::spawn(event_loop.run(handle, raw_rx, cancel.clone()));

        info!(root = %root_norm, backend = status.backend, watched = status.watched_paths, "watching");
        *session = Some(WatchSession {
            root: root_norm,
            cancel,
            task,
        });
        Ok(status)
    }

    /// Stop the current session. Pending events are discarded.
    pub async fn close(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            session.shutdown().await;
            info!(root = %session.root, "stopped watching");
        }
    }

    /// Root of the current session.
    pub async fn current_root(&self) -> Option<String> {
        self.session.lock().await.as_ref().map(|s| s.root.clone())
    }
}

struct EventLoop {
    filter: EventFilter,
    debouncer: Debouncer<String, WatchEventKind>,
    // Size seen when the last raw event arrived, for write-finish detection.
    sizes: HashMap<String, u64>,
    await_write_finish: bool,
    sink: mpsc::Sender<WatchNotice>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut handle: WatchHandle,
        mut raw: mpsc::Receiver<RawEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let deadline = self.debouncer.next_deadline();
            let wake = deadline
                .map(TokioInstant::from_std)
                .unwrap_or_else(|| TokioInstant::now() + IDLE_WAKE);

            let open = tokio::select! {
                _ = cancel.cancelled() => false,
                event = raw.recv() => match event {
                    Some(Ok(event)) => self.ingest(&mut handle, &event).await,
                    Some(Err(err)) => self.report(err).await,
                    None => false,
                },
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => self.flush().await,
            };
            if !open {
                break;
            }
        }

        // Release the backend thread before unregistering.
        drop(raw);
        handle.close();
    }

    /// Record raw paths and follow new directories. Returns false once the
    /// sink is gone.
    async fn ingest(&mut self, handle: &mut WatchHandle, event: &notify::Event) -> bool {
        let mut warnings = Vec::new();
        for path in &event.paths {
            let normalized = normalize_path(path);
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)))
                && path.is_dir()
            {
                if self.filter.accepts(&normalized, true) {
                    warnings.extend(handle.add_directory(path));
                }
                continue;
            }
            if !self.filter.accepts(&normalized, false) {
                continue;
            }
            let Some(kind) = classify_raw(&event.kind, path) else {
                continue;
            };
            trace!(path = %normalized, %kind, "raw event");

            if kind == WatchEventKind::Delete {
                self.sizes.remove(&normalized);
            } else if self.await_write_finish
                && let Ok(metadata) = std::fs::metadata(path)
            {
                self.sizes.insert(normalized.clone(), metadata.len());
            }
            self.debouncer.record(normalized, kind);
        }

        for warning in warnings {
            if self.sink.send(WatchNotice::Warning(warning)).await.is_err() {
                return false;
            }
        }
        true
    }

    /// Deliver settled events. Returns false once the sink is gone.
    async fn flush(&mut self) -> bool {
        for (path, kind) in self.debouncer.drain_ready() {
            let Some(kind) = self.settle(&path, kind) else {
                continue;
            };
            debug!(path = %path, %kind, "file changed");
            let notice = WatchNotice::Event(WatchEvent::new(kind, path));
            if self.sink.send(notice).await.is_err() {
                return false;
            }
        }
        true
    }

    fn settle(&mut self, path: &str, kind: WatchEventKind) -> Option<WatchEventKind> {
        if kind == WatchEventKind::Delete {
            self.sizes.remove(path);
            return Some(kind);
        }

        let Ok(metadata) = std::fs::metadata(path) else {
            // Gone before it settled.
            self.sizes.remove(path);
            return (kind == WatchEventKind::Change).then_some(WatchEventKind::Delete);
        };

        if self.await_write_finish {
            let size = metadata.len();
            let previous = self.sizes.insert(path.to_string(), size);
            if previous.is_some_and(|p| p != size) {
                trace!(path, size, "still being written");
                self.debouncer.defer(path.to_string(), kind);
                return None;
            }
        }
        self.sizes.remove(path);
        Some(kind)
    }

    async fn report(&mut self, err: notify::Error) -> bool {
        if is_resource_exhaustion(&err) {
            warn!(error = %err, "watcher ran out of resources");
        } else {
            debug!(error = %err, "watcher backend error");
        }
        let warning = WatchWarning::from_notify(None, &err);
        self.sink.send(WatchNotice::Warning(warning)).await.is_ok()
    }
}
