//! Typed requests, scan updates and engine events.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use strum::Display;
use tokio::sync::{mpsc, oneshot};

use filescope_core::{FileEntry, WatchEvent};
use filescope_ignore::{PatternFile, PatternScope};
use filescope_scan::ScanProgress;

use crate::error::EngineError;

/// Where a scan request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    /// Still running; `progress` holds the tally so far.
    Processing,
    /// Finished; `files` holds the result.
    Complete,
    /// Failed; `message` says why.
    Error,
    /// Cancelled or superseded by a newer request.
    Cancelled,
}

/// One message on a scan request's update stream.
#[derive(Debug, Clone, Serialize)]
pub struct ScanUpdate {
    pub status: ScanStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ScanProgress>,
}

impl ScanUpdate {
    /// Running tally.
    pub fn processing(message: impl Into<String>, progress: Option<ScanProgress>) -> Self {
        Self {
            status: ScanStatus::Processing,
            message: message.into(),
            files: None,
            progress,
        }
    }

    /// Final result.
    pub fn complete(files: Vec<FileEntry>) -> Self {
        Self {
            status: ScanStatus::Complete,
            message: format!("Loaded {} files", files.len()),
            files: Some(files),
            progress: None,
        }
    }

    /// Failure with a user-facing message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Error,
            message: message.into(),
            files: None,
            progress: None,
        }
    }

    /// Cancellation.
    pub fn cancelled() -> Self {
        Self {
            status: ScanStatus::Cancelled,
            message: "Scan cancelled".to_string(),
            files: None,
            progress: None,
        }
    }

    /// Check whether this is the last update of its stream.
    pub fn is_final(&self) -> bool {
        self.status != ScanStatus::Processing
    }
}

/// Broadcast to every subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A tracked file was added, changed or deleted.
    FileChanged(WatchEvent),
    /// Live updates are degraded or unavailable.
    WatcherWarning { message: String },
}

/// Reply channel for a request.
pub type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Requests accepted by [`IndexingEngine::serve`](crate::IndexingEngine::serve).
#[derive(Debug)]
pub enum EngineRequest {
    /// List the files of a root, using the cache unless `force_refresh`.
    RequestFileList {
        root: PathBuf,
        force_refresh: bool,
        reply: oneshot::Sender<mpsc::Receiver<ScanUpdate>>,
    },
    /// List the files of a root, bypassing the cache.
    ReloadFileList {
        root: PathBuf,
        reply: oneshot::Sender<mpsc::Receiver<ScanUpdate>>,
    },
    /// Cancel the scan in flight, if any.
    CancelScan,
    /// Build a fresh entry for one file.
    GetFileMetadata { path: PathBuf, reply: Reply<FileEntry> },
    /// Read a pattern tier.
    LoadPatterns {
        scope: PatternScope,
        root: Option<PathBuf>,
        reply: Reply<PatternFile>,
    },
    /// Replace a pattern tier's user text.
    SavePatterns {
        scope: PatternScope,
        root: Option<PathBuf>,
        text: String,
        reply: Reply<()>,
    },
    /// Delete a pattern tier's file.
    ResetPatterns {
        scope: PatternScope,
        root: Option<PathBuf>,
        reply: Reply<()>,
    },
    /// Flip one system pattern on or off.
    ToggleSystemPattern {
        pattern: String,
        reply: Reply<BTreeSet<String>>,
    },
    /// Close the watcher.
    StopWatching,
}
