//! Scan progress reporting.

use std::time::Duration;

use serde::Serialize;

/// Progress of a chunked scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    /// Files recorded so far.
    pub files_scanned: u64,
    /// Directories visited so far.
    pub dirs_scanned: u64,
    /// Bytes across recorded files.
    pub bytes_scanned: u64,
    /// Directories still queued.
    pub dirs_pending: usize,
    /// Directory processed most recently.
    pub current_path: String,
    /// Warnings so far.
    pub errors_count: u64,
    /// Time since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}
