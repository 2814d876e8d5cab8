//! Live file watching for filescope.
//!
//! A [`FileWatcher`] owns one session at a time. Raw notifications from a
//! [`Watcher`] backend are filtered through the root's ignore rules, then
//! held in a [`Debouncer`] until each path has been quiet for the configured
//! window, so a burst of writes becomes a single add, change or delete.
//!
//! Two backends are provided:
//!
//! - [`NativeWatcher`]: OS notifications, one watch per directory
//! - [`PollingWatcher`]: periodic rescans for network or virtual filesystems
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use filescope_core::WatchConfig;
//! use filescope_ignore::{PatternResolver, ResolverConfig};
//! use filescope_watch::{FileWatcher, WatchNotice};
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), filescope_watch::WatchError> {
//! let resolver = PatternResolver::new(ResolverConfig::default());
//! let root = Path::new("/path/to/project");
//! let watcher = FileWatcher::native(WatchConfig::default());
//!
//! let (tx, mut rx) = mpsc::channel(64);
//! watcher.start(root, resolver.matcher(root), tx).await?;
//! while let Some(notice) = rx.recv().await {
//!     if let WatchNotice::Event(event) = notice {
//!         println!("{} {}", event.kind, event.path);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod debounce;
mod error;
mod filter;
mod watcher;

pub use backend::{
    NativeWatcher, PollingWatcher, RawEvent, RawEventSender, WatchHandle, Watcher,
    discover_directories,
};
pub use debounce::{Coalesce, Debouncer};
pub use error::{WatchError, WatchWarning, WatchWarningKind, is_resource_exhaustion};
pub use filter::{EventFilter, classify_raw};
pub use watcher::{FileWatcher, WatchNotice, WatchStatus};
