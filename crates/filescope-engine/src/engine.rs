//! The indexing engine: cached, single-flight scans plus live updates.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use filescope_core::{
    EngineConfig, FileEntry, ScanError, WatchEvent, WatchEventKind, normalize_path, relative_path,
};
use filescope_ignore::{LOCAL_PATTERN_FILE, PatternFile, PatternResolver, PatternScope};
use filescope_scan::{DirectoryCache, DirectoryScanner, ScanOutcome, is_scannable_path};
use filescope_watch::{FileWatcher, WatchNotice, Watcher};

use crate::active::ActiveFiles;
use crate::error::EngineError;
use crate::protocol::{EngineEvent, EngineRequest, ScanUpdate};
use crate::session::{ScanSession, ScanSessions};

struct EngineInner {
    config: EngineConfig,
    scanner: Arc<DirectoryScanner>,
    cache: DirectoryCache,
    watcher: FileWatcher,
    sessions: ScanSessions,
    active: ActiveFiles,
    events: broadcast::Sender<EngineEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
    runtime: Option<Handle>,
}

/// Owns the cache, the current scan session, the watcher and the active
/// file set for one process.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct IndexingEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for IndexingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingEngine")
            .field("loading", &self.is_loading())
            .field("active_root", &self.inner.active.root())
            .field("cached_roots", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

impl IndexingEngine {
    /// Create an engine on the native watcher backend.
    pub fn new(config: EngineConfig, resolver: Arc<PatternResolver>) -> Self {
        let scanner = DirectoryScanner::new(config.scan.clone(), resolver);
        let watcher = FileWatcher::native(config.watch.clone());
        Self::from_parts(config, scanner, watcher)
    }

    /// Create an engine on a specific watcher backend.
    pub fn with_watcher(
        config: EngineConfig,
        resolver: Arc<PatternResolver>,
        backend: Arc<dyn Watcher>,
    ) -> Self {
        let scanner = DirectoryScanner::new(config.scan.clone(), resolver);
        let watcher = FileWatcher::new(backend, config.watch.clone());
        Self::from_parts(config, scanner, watcher)
    }

    /// Assemble an engine from prepared components.
    ///
    /// Scans are spawned on the runtime the engine was created in, so the
    /// request methods may be called from plain threads afterwards.
    pub fn from_parts(config: EngineConfig, scanner: DirectoryScanner, watcher: FileWatcher) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_size.max(1));
        Self {
            inner: Arc::new(EngineInner {
                cache: DirectoryCache::new(config.cache_ttl),
                scanner: Arc::new(scanner),
                watcher,
                sessions: ScanSessions::new(),
                active: ActiveFiles::new(),
                events,
                pump: Mutex::new(None),
                runtime: Handle::try_current().ok(),
                config,
            }),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Pattern resolver used by scans and the watcher.
    pub fn resolver(&self) -> &Arc<PatternResolver> {
        self.inner.scanner.resolver()
    }

    /// Directory cache.
    pub fn cache(&self) -> &DirectoryCache {
        &self.inner.cache
    }

    /// List the files under `root`.
    ///
    /// Supersedes any scan in flight. The returned stream carries zero or
    /// more `processing` updates followed by exactly one final update.
    pub fn request_file_list(&self, root: &Path, force_refresh: bool) -> mpsc::Receiver<ScanUpdate> {
        let (tx, rx) = mpsc::channel(self.inner.config.update_channel_size.max(1));
        let session = self.inner.sessions.begin(normalize_path(root));

        let Some(runtime) = self.inner.runtime() else {
            warn!(root = %session.root, "no async runtime to run the scan on");
            self.inner.sessions.finish(session.id);
            let _ = tx.try_send(ScanUpdate::error(NO_RUNTIME));
            return rx;
        };

        let inner = Arc::clone(&self.inner);
        let root = root.to_path_buf();
        runtime.spawn(async move {
            inner.run_request(session, root, force_refresh, tx).await;
        });

        rx
    }

    /// [`request_file_list`](Self::request_file_list) as a stream.
    pub fn file_list_stream(&self, root: &Path, force_refresh: bool) -> ReceiverStream<ScanUpdate> {
        ReceiverStream::new(self.request_file_list(root, force_refresh))
    }

    /// List the files under `root`, ignoring the cache.
    pub fn reload_file_list(&self, root: &Path) -> mpsc::Receiver<ScanUpdate> {
        self.request_file_list(root, true)
    }

    /// Cancel the scan in flight. Always leaves the engine idle.
    pub fn cancel_scan(&self) {
        if self.inner.sessions.cancel() {
            info!("scan cancelled");
        }
    }

    /// Check whether a scan is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.sessions.is_loading()
    }

    /// Files of the most recently loaded root, including live changes.
    pub fn active_files(&self) -> Vec<FileEntry> {
        self.inner.active.snapshot()
    }

    /// Root of the active file set.
    pub fn active_root(&self) -> Option<String> {
        self.inner.active.root()
    }

    /// Build a fresh entry for one file without rescanning.
    ///
    /// Exclusion is judged against the active root when the file lies below
    /// it, otherwise against the file's own directory.
    pub async fn get_file_metadata(&self, path: &Path) -> Result<FileEntry, EngineError> {
        let normalized = normalize_path(path);
        let root = match self.inner.active.root() {
            Some(root) if relative_path(&root, &normalized).is_some() => {
                PathBuf::from(root)
            }
            _ => Path::new(&normalized)
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| ScanError::NotFound {
                    path: path.to_path_buf(),
                })?,
        };

        let scanner = Arc::clone(&self.inner.scanner);
        let file = PathBuf::from(normalized);
        let entry = tokio::task::spawn_blocking(move || scanner.file_entry(&root, &file)).await??;
        Ok(entry)
    }

    /// Subscribe to file changes and watcher warnings.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Stop live updates.
    pub async fn stop_watching(&self) {
        self.inner.watcher.close().await;
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
    }

    /// Read a pattern tier.
    pub fn load_patterns(
        &self,
        scope: PatternScope,
        root: Option<&Path>,
    ) -> Result<PatternFile, EngineError> {
        Ok(self.resolver().load_patterns(scope, root)?)
    }

    /// Replace a tier's user text and drop every listing it affects.
    pub async fn save_patterns(
        &self,
        scope: PatternScope,
        root: Option<&Path>,
        text: &str,
    ) -> Result<(), EngineError> {
        self.resolver().save_patterns(scope, root, text)?;
        self.patterns_changed(scope, root).await;
        Ok(())
    }

    /// Delete a tier's file and drop every listing it affects.
    pub async fn reset_patterns(
        &self,
        scope: PatternScope,
        root: Option<&Path>,
    ) -> Result<(), EngineError> {
        self.resolver().reset_patterns(scope, root)?;
        self.patterns_changed(scope, root).await;
        Ok(())
    }

    /// Flip a system pattern. Returns the disabled set afterwards.
    pub async fn toggle_system_pattern(&self, pattern: &str) -> Result<BTreeSet<String>, EngineError> {
        let disabled = self.resolver().toggle_system_pattern(pattern)?;
        self.patterns_changed(PatternScope::Global, None).await;
        Ok(disabled)
    }

    async fn patterns_changed(&self, scope: PatternScope, root: Option<&Path>) {
        let root = match (scope, root) {
            (PatternScope::Local, Some(root)) => Some(normalize_path(root)),
            // Any root's effective set may have changed.
            _ => None,
        };
        self.inner.patterns_changed(root.as_deref()).await;
    }

    /// Handle requests until the channel closes.
    pub async fn serve(&self, mut requests: mpsc::Receiver<EngineRequest>) {
        while let Some(request) = requests.recv().await {
            self.handle(request).await;
        }
        debug!("request channel closed");
        self.cancel_scan();
        self.stop_watching().await;
    }

    async fn handle(&self, request: EngineRequest) {
        match request {
            EngineRequest::RequestFileList {
                root,
                force_refresh,
                reply,
            } => {
                let _ = reply.send(self.request_file_list(&root, force_refresh));
            }
            EngineRequest::ReloadFileList { root, reply } => {
                let _ = reply.send(self.reload_file_list(&root));
            }
            EngineRequest::CancelScan => self.cancel_scan(),
            EngineRequest::GetFileMetadata { path, reply } => {
                let _ = reply.send(self.get_file_metadata(&path).await);
            }
            EngineRequest::LoadPatterns { scope, root, reply } => {
                let _ = reply.send(self.load_patterns(scope, root.as_deref()));
            }
            EngineRequest::SavePatterns {
                scope,
                root,
                text,
                reply,
            } => {
                let _ = reply.send(self.save_patterns(scope, root.as_deref(), &text).await);
            }
            EngineRequest::ResetPatterns { scope, root, reply } => {
                let _ = reply.send(self.reset_patterns(scope, root.as_deref()).await);
            }
            EngineRequest::ToggleSystemPattern { pattern, reply } => {
                let _ = reply.send(self.toggle_system_pattern(&pattern).await);
            }
            EngineRequest::StopWatching => self.stop_watching().await,
        }
    }
}

const NO_RUNTIME: &str = "No async runtime is available to run the scan";

impl EngineInner {
    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    async fn run_request(
        self: Arc<Self>,
        session: ScanSession,
        root: PathBuf,
        force_refresh: bool,
        tx: mpsc::Sender<ScanUpdate>,
    ) {
        let root_norm = session.root.clone();

        if !force_refresh && let Some(files) = self.cache.get(&root_norm) {
            if !self.sessions.finish(session.id) {
                debug!(root = %root_norm, id = session.id, "cached listing superseded");
                let _ = tx.send(ScanUpdate::cancelled()).await;
                return;
            }
            debug!(root = %root_norm, files = files.len(), "cache hit");
            self.active.replace(&root_norm, files.clone());
            self.arm_watcher(&root).await;
            let _ = tx.send(ScanUpdate::complete(files)).await;
            return;
        }

        self.cache.clear(Some(&root_norm));
        let _ = tx
            .send(ScanUpdate::processing("Scanning directory...", None))
            .await;

        let timeout = self.config.scan_timeout;
        let result = match tokio::time::timeout(timeout, self.scan_chunks(&session, &root, &tx)).await
        {
            Ok(result) => result,
            Err(_) => {
                session.cancel.cancel();
                warn!(root = %root_norm, seconds = timeout.as_secs(), "scan timed out");
                Err(ScanError::TimedOut {
                    seconds: timeout.as_secs(),
                })
            }
        };

        let current = self.sessions.finish(session.id);
        let update = match result {
            Ok(outcome) if current => {
                info!(
                    root = %root_norm,
                    files = outcome.files.len(),
                    dirs = outcome.stats.total_dirs,
                    truncated = outcome.stats.truncated_dirs,
                    elapsed_ms = outcome.duration.as_millis() as u64,
                    "scan complete"
                );
                self.cache.set(&root_norm, outcome.files.clone());
                self.active.replace(&root_norm, outcome.files.clone());
                self.arm_watcher(&root).await;
                ScanUpdate::complete(outcome.files)
            }
            // Finished after being superseded; the newer request owns the state.
            Ok(_) | Err(ScanError::Cancelled) => {
                debug!(root = %root_norm, id = session.id, "scan discarded");
                ScanUpdate::cancelled()
            }
            Err(err) => {
                warn!(root = %root_norm, error = %err, "scan failed");
                ScanUpdate::error(err.to_string())
            }
        };
        let _ = tx.send(update).await;
    }

    async fn scan_chunks(
        &self,
        session: &ScanSession,
        root: &Path,
        tx: &mpsc::Sender<ScanUpdate>,
    ) -> Result<ScanOutcome, ScanError> {
        let scanner = Arc::clone(&self.scanner);
        let start_root = root.to_path_buf();
        let (mut job, top_level) = tokio::task::spawn_blocking(move || {
            let top_level = DirectoryScanner::top_level_entry_count(&start_root);
            scanner.start(&start_root).map(|job| (job, top_level))
        })
        .await
        .map_err(task_failed)??;

        let chunk = self.config.chunk_size_for(top_level);
        debug!(root = %session.root, chunk, top_level, "scanning in chunks");

        loop {
            if session.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let (returned, done) = tokio::task::spawn_blocking(move || {
                let done = job.step(chunk);
                (job, done)
            })
            .await
            .map_err(task_failed)?;
            job = returned;

            if done {
                break;
            }

            let progress = job.progress();
            let message = format!("Processed {} files...", progress.files_scanned);
            // Progress is advisory; a slow reader never stalls the scan.
            let _ = tx.try_send(ScanUpdate::processing(message, Some(progress)));
            tokio::task::yield_now().await;
        }

        if session.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(job.finish())
    }

    async fn arm_watcher(self: &Arc<Self>, root: &Path) {
        if !self.config.watch_after_scan || self.scanner.is_app_directory(root) {
            return;
        }

        let matcher = self.scanner.resolver().matcher(root);
        let (tx, rx) = mpsc::channel(self.config.watch.channel_size.max(1));
        match self.watcher.start(root, matcher, tx).await {
            Ok(status) => {
                for warning in status.warnings {
                    self.broadcast(EngineEvent::WatcherWarning {
                        message: warning.message,
                    });
                }
                let pump = tokio::spawn(pump_notices(Arc::downgrade(self), rx));
                if let Some(previous) = self.pump.lock().replace(pump) {
                    previous.abort();
                }
            }
            Err(err) => {
                warn!(root = %root.display(), error = %err, "live updates unavailable");
                self.broadcast(EngineEvent::WatcherWarning {
                    message: format!("Live updates unavailable: {err}"),
                });
            }
        }
    }

    /// Drop cached listings affected by a pattern change, bring the active
    /// set in line, and restart the watcher with the new matcher.
    ///
    /// `root` limits the change to one root; `None` means every root.
    async fn patterns_changed(self: &Arc<Self>, root: Option<&str>) {
        self.cache.clear(root);

        if let Some(active_root) = self.active.root()
            && root.is_none_or(|root| root == active_root)
        {
            let scanner = Arc::clone(&self.scanner);
            let files = self.active.snapshot();
            let reapply_root = PathBuf::from(&active_root);
            match tokio::task::spawn_blocking(move || scanner.reapply_patterns(&reapply_root, files))
                .await
            {
                Ok(files) => {
                    debug!(root = %active_root, files = files.len(), "active set updated for new patterns");
                    self.active.replace(&active_root, files);
                }
                Err(err) => warn!(root = %active_root, error = %err, "reapplying patterns failed"),
            }
        }

        // The running watcher filters with the old matcher.
        if let Some(watched) = self.watcher.current_root().await {
            self.arm_watcher(Path::new(&watched)).await;
        }
    }

    /// Apply one debounced event to the active set and cached snapshots.
    async fn reconcile(self: &Arc<Self>, event: &WatchEvent) -> bool {
        let Some(root) = self.active.root() else {
            return false;
        };
        if relative_path(&root, &event.path) == Some(LOCAL_PATTERN_FILE) {
            info!(root = %root, "local patterns edited on disk");
            self.scanner.resolver().clear_cache(Some(Path::new(&root)));
            // Re-arming replaces the task delivering this event.
            let inner = Arc::clone(self);
            tokio::spawn(async move { inner.patterns_changed(Some(root.as_str())).await });
            return false;
        }
        if !is_scannable_path(&root, &event.path, self.scanner.config()) {
            return false;
        }

        match event.kind {
            WatchEventKind::Add | WatchEventKind::Change => {
                let scanner = Arc::clone(&self.scanner);
                let root_path = PathBuf::from(&root);
                let path = PathBuf::from(&event.path);
                let refreshed =
                    tokio::task::spawn_blocking(move || scanner.file_entry(&root_path, &path)).await;

                match refreshed {
                    Ok(Ok(entry)) => {
                        self.cache.upsert_file(&entry);
                        self.active.upsert(entry);
                    }
                    Ok(Err(ScanError::NotFound { .. })) => {
                        self.forget(&event.path);
                    }
                    Ok(Err(err)) => {
                        debug!(path = %event.path, error = %err, "could not refresh entry");
                        return false;
                    }
                    Err(err) => {
                        warn!(path = %event.path, error = %err, "refresh task failed");
                        return false;
                    }
                }
            }
            WatchEventKind::Delete => self.forget(&event.path),
        }
        true
    }

    fn forget(&self, path: &str) {
        let removed = self.active.remove(path);
        self.cache.remove_path(path);
        debug!(path, removed, "removed from active set");
    }

    fn broadcast(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// Boxed: reconciling can re-arm the watcher, which spawns a new pump.
fn pump_notices(
    engine: Weak<EngineInner>,
    mut notices: mpsc::Receiver<WatchNotice>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        while let Some(notice) = notices.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            match notice {
                WatchNotice::Event(event) => {
                    if engine.reconcile(&event).await {
                        engine.broadcast(EngineEvent::FileChanged(event));
                    }
                }
                WatchNotice::Warning(warning) => {
                    engine.broadcast(EngineEvent::WatcherWarning {
                        message: warning.message,
                    });
                }
            }
        }
    })
}

fn task_failed(err: tokio::task::JoinError) -> ScanError {
    ScanError::Other {
        message: format!("Scan task failed: {err}"),
    }
}
