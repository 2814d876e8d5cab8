use filescope_core::{EngineConfig, WatchConfig, WatchEventKind, normalize_path};
use filescope_engine::{EngineEvent, EngineRequest, IndexingEngine, ScanStatus, ScanUpdate};
use filescope_ignore::{PatternResolver, PatternScope, ResolverConfig};
use filescope_watch::PollingWatcher;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_stream::StreamExt;

fn engine_with(config: EngineConfig) -> IndexingEngine {
    let resolver = Arc::new(PatternResolver::new(ResolverConfig::default().in_memory()));
    IndexingEngine::new(config, resolver)
}

fn engine() -> IndexingEngine {
    engine_with(EngineConfig::default())
}

fn quiet_config() -> EngineConfig {
    EngineConfig::builder().watch_after_scan(false).build().unwrap()
}

async fn final_update(mut rx: mpsc::Receiver<ScanUpdate>) -> ScanUpdate {
    timeout(Duration::from_secs(10), async {
        while let Some(update) = rx.recv().await {
            if update.is_final() {
                return update;
            }
        }
        panic!("update stream ended without a final update");
    })
    .await
    .expect("scan did not finish")
}

async fn next_change(events: &mut broadcast::Receiver<EngineEvent>) -> Option<filescope_core::WatchEvent> {
    timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await {
                Ok(EngineEvent::FileChanged(event)) => return Some(event),
                Ok(EngineEvent::WatcherWarning { .. }) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(temp.path().join("src/a.ts"), "export const a = 1;\n").unwrap();
    fs::write(temp.path().join("README.md"), "# Project\n").unwrap();
    temp
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_completes_and_is_cached() {
    let temp = project();
    let engine = engine_with(quiet_config());

    let update = final_update(engine.request_file_list(temp.path(), false)).await;
    assert_eq!(update.status, ScanStatus::Complete);
    assert_eq!(update.files.as_ref().unwrap().len(), 2);
    assert!(!engine.is_loading());
    assert_eq!(engine.active_files().len(), 2);

    // Served from the cache: the new file is not seen.
    fs::write(temp.path().join("late.txt"), "late").unwrap();
    let cached = final_update(engine.request_file_list(temp.path(), false)).await;
    assert_eq!(cached.files.unwrap().len(), 2);

    let reloaded = final_update(engine.reload_file_list(temp.path())).await;
    assert_eq!(reloaded.files.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_reports_progress_then_result() {
    let temp = TempDir::new().unwrap();
    for i in 0..12 {
        let dir = temp.path().join(format!("dir{i:02}"));
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("f.txt"), "x").unwrap();
    }
    let engine = engine_with(quiet_config());

    let updates: Vec<ScanUpdate> = engine
        .file_list_stream(temp.path(), false)
        .collect()
        .await;

    assert_eq!(updates.first().unwrap().status, ScanStatus::Processing);
    let last = updates.last().unwrap();
    assert_eq!(last.status, ScanStatus::Complete);
    assert_eq!(last.files.as_ref().unwrap().len(), 12);
    assert_eq!(updates.iter().filter(|u| u.is_final()).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_root_reports_error() {
    let temp = TempDir::new().unwrap();
    let engine = engine_with(quiet_config());

    let update = final_update(engine.request_file_list(&temp.path().join("nope"), false)).await;
    assert_eq!(update.status, ScanStatus::Error);
    assert!(update.message.contains("not found"));
    assert!(!engine.is_loading());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_reports_hint() {
    let temp = project();
    let config = EngineConfig::builder()
        .scan_timeout(Duration::ZERO)
        .watch_after_scan(false)
        .build()
        .unwrap();
    let engine = engine_with(config);

    let update = final_update(engine.request_file_list(temp.path(), false)).await;
    assert_eq!(update.status, ScanStatus::Error);
    assert!(update.message.contains("too large"));
    assert!(!engine.is_loading());
    assert!(engine.cache().get(&normalize_path(temp.path())).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_request_supersedes_old() {
    let first = project();
    let second = project();
    let engine = engine_with(quiet_config());

    let old = engine.request_file_list(first.path(), false);
    let new = engine.request_file_list(second.path(), false);

    assert_eq!(final_update(old).await.status, ScanStatus::Cancelled);
    assert_eq!(final_update(new).await.status, ScanStatus::Complete);
    assert_eq!(engine.active_root(), Some(normalize_path(second.path())));
}

#[tokio::test(flavor = "current_thread")]
async fn test_cached_request_is_superseded() {
    let first = project();
    let second = project();
    let engine = engine_with(quiet_config());
    final_update(engine.request_file_list(first.path(), false)).await;
    final_update(engine.request_file_list(second.path(), false)).await;
    assert_eq!(engine.cache().len(), 2);

    let old = engine.request_file_list(first.path(), false);
    let new = engine.request_file_list(second.path(), false);

    assert_eq!(final_update(old).await.status, ScanStatus::Cancelled);
    assert_eq!(final_update(new).await.status, ScanStatus::Complete);
    assert_eq!(engine.active_root(), Some(normalize_path(second.path())));
    assert!(!engine.is_loading());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_is_idempotent() {
    let temp = project();
    let engine = engine_with(quiet_config());

    engine.cancel_scan();
    let rx = engine.request_file_list(temp.path(), false);
    engine.cancel_scan();
    engine.cancel_scan();
    assert!(!engine.is_loading());

    let update = final_update(rx).await;
    assert!(matches!(update.status, ScanStatus::Cancelled | ScanStatus::Complete));
    assert!(!engine.is_loading());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_local_patterns_invalidate_cache() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.py"), "print('hi')\n").unwrap();
    fs::write(temp.path().join("app.ts"), "console.log('hi');\n").unwrap();
    let engine = engine_with(quiet_config());

    let before = final_update(engine.request_file_list(temp.path(), false)).await;
    assert!(before.files.unwrap().iter().all(|f| f.is_included()));

    engine
        .save_patterns(PatternScope::Local, Some(temp.path()), "*.py\n")
        .await
        .unwrap();
    assert!(engine.cache().get(&normalize_path(temp.path())).is_none());

    let after = final_update(engine.request_file_list(temp.path(), false)).await;
    let files = after.files.unwrap();
    let py = files.iter().find(|f| f.name.as_str() == "app.py").unwrap();
    let ts = files.iter().find(|f| f.name.as_str() == "app.ts").unwrap();
    assert!(py.excluded_by_default);
    assert!(ts.is_included());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pattern_change_updates_active_set() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.py"), "print('hi')\n").unwrap();
    fs::write(temp.path().join("app.ts"), "console.log('hi');\n").unwrap();
    let engine = engine_with(quiet_config());
    final_update(engine.request_file_list(temp.path(), false)).await;

    engine
        .save_patterns(PatternScope::Local, Some(temp.path()), "*.ts\n")
        .await
        .unwrap();

    let files = engine.active_files();
    let ts = files.iter().find(|f| f.name.as_str() == "app.ts").unwrap();
    let py = files.iter().find(|f| f.name.as_str() == "app.py").unwrap();
    assert!(ts.excluded_by_default);
    assert!(ts.content.is_none());
    assert!(py.is_included());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_toggle_clears_every_root() {
    let first = project();
    let second = project();
    let engine = engine_with(quiet_config());
    final_update(engine.request_file_list(first.path(), false)).await;
    final_update(engine.request_file_list(second.path(), false)).await;
    assert_eq!(engine.cache().len(), 2);

    let disabled = engine.toggle_system_pattern("**/*.log").await.unwrap();
    assert!(disabled.contains("**/*.log"));
    assert!(engine.cache().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_file_is_reconciled() {
    let temp = project();
    let engine = engine();
    let mut events = engine.subscribe();

    let update = final_update(engine.request_file_list(temp.path(), false)).await;
    assert_eq!(update.status, ScanStatus::Complete);

    let path = temp.path().join("src/new.ts");
    fs::write(&path, "export function hello() { return 'world'; }\n").unwrap();

    let event = next_change(&mut events).await.expect("no add event");
    assert_eq!(event.kind, WatchEventKind::Add);
    assert_eq!(event.path, normalize_path(&path));

    let entry = engine.get_file_metadata(&path).await.unwrap();
    assert!(!entry.is_skipped);
    assert_eq!(entry.size, 44);
    assert!(entry.token_count > 0);
    assert!(engine.active_files().iter().any(|f| f.path == event.path));

    fs::remove_file(&path).unwrap();
    let event = next_change(&mut events).await.expect("no delete event");
    assert_eq!(event.kind, WatchEventKind::Delete);
    assert!(engine.active_files().iter().all(|f| f.path != event.path));
    let cached = engine.cache().get(&normalize_path(temp.path())).unwrap();
    assert!(cached.iter().all(|f| f.path != event.path));

    engine.stop_watching().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_excluded_file_is_reconciled() {
    let temp = project();
    let app = temp.path().join("app.py");
    fs::write(&app, "print('hi')\n").unwrap();
    let engine = engine();
    engine
        .save_patterns(PatternScope::Local, Some(temp.path()), "*.py\n")
        .await
        .unwrap();
    let mut events = engine.subscribe();

    final_update(engine.request_file_list(temp.path(), false)).await;
    let files = engine.active_files();
    let py = files.iter().find(|f| f.name.as_str() == "app.py").unwrap();
    assert!(py.excluded_by_default);
    assert!(py.content.is_none());
    assert_eq!(py.token_count, 0);

    fs::remove_file(&app).unwrap();
    let event = next_change(&mut events).await.expect("no delete event");
    assert_eq!(event.kind, WatchEventKind::Delete);
    assert_eq!(event.path, normalize_path(&app));
    assert!(engine.active_files().iter().all(|f| f.name.as_str() != "app.py"));

    engine.stop_watching().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_local_pattern_file_edits_are_picked_up() {
    let temp = project();
    fs::write(temp.path().join("app.py"), "print('hi')\n").unwrap();
    let engine = engine();

    final_update(engine.request_file_list(temp.path(), false)).await;
    let is_py_excluded = |engine: &IndexingEngine| {
        engine
            .active_files()
            .iter()
            .any(|f| f.name.as_str() == "app.py" && f.excluded_by_default)
    };
    assert!(!is_py_excluded(&engine));

    fs::write(temp.path().join(".repo_ignore"), "*.py\n").unwrap();

    let excluded = timeout(Duration::from_secs(5), async {
        while !is_py_excluded(&engine) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(excluded.is_ok(), "pattern file edit was not applied");
    assert!(engine.cache().get(&normalize_path(temp.path())).is_none());

    engine.stop_watching().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_limit_reaches_subscribers() {
    let temp = TempDir::new().unwrap();
    for name in ["a", "b", "c", "d", "e"] {
        fs::create_dir(temp.path().join(name)).unwrap();
        fs::write(temp.path().join(name).join("f.txt"), "x").unwrap();
    }
    let watch = WatchConfig::builder().max_watchers(2usize).build().unwrap();
    let config = EngineConfig::builder().watch(watch.clone()).build().unwrap();
    let resolver = Arc::new(PatternResolver::new(ResolverConfig::default().in_memory()));
    let engine = IndexingEngine::with_watcher(config, resolver, Arc::new(PollingWatcher::new(&watch)));
    let mut events = engine.subscribe();

    let update = final_update(engine.request_file_list(temp.path(), false)).await;
    assert_eq!(update.status, ScanStatus::Complete);

    let message = timeout(Duration::from_secs(3), async {
        loop {
            if let Ok(EngineEvent::WatcherWarning { message }) = events.recv().await {
                return message;
            }
        }
    })
    .await
    .expect("no watcher warning");
    assert!(message.contains("Watch limit of 2"));

    engine.stop_watching().await;
}

#[test]
fn test_request_without_runtime_reports_error() {
    let temp = project();
    let engine = engine_with(quiet_config());

    let mut rx = engine.request_file_list(temp.path(), false);
    let update = rx.try_recv().unwrap();
    assert_eq!(update.status, ScanStatus::Error);
    assert!(!engine.is_loading());
}

#[test]
fn test_requests_from_plain_threads_use_engine_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let temp = project();
    let engine = runtime.block_on(async { engine_with(quiet_config()) });

    // Called outside the runtime.
    let rx = engine.request_file_list(temp.path(), false);
    let update = runtime.block_on(final_update(rx));
    assert_eq!(update.status, ScanStatus::Complete);
    assert_eq!(update.files.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_serve_dispatches_requests() {
    let temp = project();
    let engine = engine_with(quiet_config());
    let (requests, rx) = mpsc::channel(8);
    let server = tokio::spawn({
        let engine = engine.clone();
        async move { engine.serve(rx).await }
    });

    let (reply, listing) = oneshot::channel();
    requests
        .send(EngineRequest::RequestFileList {
            root: temp.path().to_path_buf(),
            force_refresh: false,
            reply,
        })
        .await
        .unwrap();
    let update = final_update(listing.await.unwrap()).await;
    assert_eq!(update.status, ScanStatus::Complete);

    let (reply, metadata) = oneshot::channel();
    requests
        .send(EngineRequest::GetFileMetadata {
            path: temp.path().join("README.md"),
            reply,
        })
        .await
        .unwrap();
    let entry = metadata.await.unwrap().unwrap();
    assert_eq!(entry.size, 10);

    let (reply, missing) = oneshot::channel();
    requests
        .send(EngineRequest::GetFileMetadata {
            path: temp.path().join("missing.md"),
            reply,
        })
        .await
        .unwrap();
    assert!(missing.await.unwrap().is_err());

    drop(requests);
    server.await.unwrap();
}

#[test]
fn test_update_serializes_lowercase_status() {
    let update = ScanUpdate::error("boom");
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json["status"], "error");
    assert!(json.get("files").is_none());
    assert_eq!(ScanUpdate::complete(Vec::new()).message, "Loaded 0 files");
}
