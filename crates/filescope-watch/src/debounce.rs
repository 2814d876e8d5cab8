//! Per-key event debouncing with coalescing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use filescope_core::{Clock, SystemClock, WatchEventKind};

/// Merges a newer event for the same key into a pending one.
pub trait Coalesce: Sized {
    /// Combine `self` (pending) with `next`. `None` cancels both.
    fn coalesce(self, next: Self) -> Option<Self>;
}

impl Coalesce for WatchEventKind {
    fn coalesce(self, next: Self) -> Option<Self> {
        use WatchEventKind::{Add, Change, Delete};
        match (self, next) {
            (Add, Change) => Some(Add),
            // Created and removed inside one window: nothing happened.
            (Add, Delete) => None,
            (Change, Delete) => Some(Delete),
            // Replaced in place
            (Delete, Add) => Some(Change),
            (_, next) => Some(next),
        }
    }
}

#[derive(Debug)]
struct Pending<E> {
    event: E,
    last_seen: Instant,
}

/// Holds events until their key has been quiet for a full window.
///
/// Each new event for a key restarts that key's window, so a burst yields a
/// single coalesced event once the burst ends.
#[derive(Debug)]
pub struct Debouncer<K, E> {
    window: Duration,
    clock: Arc<dyn Clock>,
    pending: HashMap<K, Pending<E>>,
}

impl<K, E> Debouncer<K, E>
where
    K: Eq + Hash + Clone,
    E: Coalesce,
{
    /// Create a debouncer on the system clock.
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    /// Create a debouncer on a specific clock.
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            pending: HashMap::new(),
        }
    }

    /// Quiet window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event, coalescing with any pending one for `key`.
    pub fn record(&mut self, key: K, event: E) {
        let now = self.clock.now();
        match self.pending.remove(&key) {
            Some(existing) => {
                if let Some(event) = existing.event.coalesce(event) {
                    self.pending.insert(key, Pending { event, last_seen: now });
                }
            }
            None => {
                self.pending.insert(key, Pending { event, last_seen: now });
            }
        }
    }

    /// Put an event back with a fresh window, replacing any pending one.
    pub fn defer(&mut self, key: K, event: E) {
        let now = self.clock.now();
        self.pending.insert(key, Pending { event, last_seen: now });
    }

    /// Remove and return every event whose window has elapsed, oldest first.
    pub fn drain_ready(&mut self) -> Vec<(K, E)> {
        let now = self.clock.now();
        let ready: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| now.duration_since(p.last_seen) >= self.window)
            .map(|(k, _)| k.clone())
            .collect();

        let mut drained: Vec<(K, Pending<E>)> = ready
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p)))
            .collect();
        drained.sort_by_key(|(_, p)| p.last_seen);
        drained.into_iter().map(|(k, p)| (k, p.event)).collect()
    }

    /// Remove and return everything regardless of windows.
    pub fn drain_all(&mut self) -> Vec<(K, E)> {
        let mut drained: Vec<_> = self.pending.drain().collect();
        drained.sort_by_key(|(_, p)| p.last_seen);
        drained.into_iter().map(|(k, p)| (k, p.event)).collect()
    }

    /// When the next pending window elapses.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .map(|p| p.last_seen + self.window)
            .min()
    }

    /// Number of pending keys.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
