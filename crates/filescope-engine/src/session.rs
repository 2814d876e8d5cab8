//! Single-flight bookkeeping for scan requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One scan request in flight.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: u64,
    pub root: String,
    pub cancel: CancellationToken,
    pub started: Instant,
}

impl ScanSession {
    /// Check whether the session was cancelled or superseded.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Tracks the single current scan session.
#[derive(Debug, Default)]
pub struct ScanSessions {
    next_id: AtomicU64,
    current: Mutex<Option<ScanSession>>,
}

impl ScanSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session, cancelling whichever one was current.
    pub fn begin(&self, root: impl Into<String>) -> ScanSession {
        let session = ScanSession {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            root: root.into(),
            cancel: CancellationToken::new(),
            started: Instant::now(),
        };

        if let Some(previous) = self.current.lock().replace(session.clone()) {
            debug!(id = previous.id, root = %previous.root, "superseding scan");
            previous.cancel.cancel();
        }
        session
    }

    /// Retire session `id`. Returns false if it was no longer current.
    pub fn finish(&self, id: u64) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|s| s.id == id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Cancel the current session. Safe to call at any time.
    pub fn cancel(&self) -> bool {
        match self.current.lock().take() {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Check whether a scan is in flight.
    pub fn is_loading(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Root of the scan in flight.
    pub fn current_root(&self) -> Option<String> {
        self.current.lock().as_ref().map(|s| s.root.clone())
    }
}
