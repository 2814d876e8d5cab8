//! Scan statistics.

use serde::{Deserialize, Serialize};

use crate::entry::FileEntry;

/// Summary statistics for a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Entries recorded.
    pub total_files: u64,
    /// Directories visited.
    pub total_dirs: u64,
    /// Total size of recorded files in bytes.
    pub total_size: u64,
    /// Files classified as binary.
    pub binary_files: u64,
    /// Files too large or unreadable.
    pub skipped_files: u64,
    /// Files matched by the ignore patterns.
    pub excluded_files: u64,
    /// Tokens across included text files.
    pub total_tokens: u64,
    /// Directories cut short by a structural limit.
    pub truncated_dirs: u64,
    /// Deepest level reached below the root.
    pub max_depth: u32,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a recorded entry.
    pub fn record_file(&mut self, entry: &FileEntry) {
        self.total_files += 1;
        self.total_size += entry.size;
        if entry.is_binary {
            self.binary_files += 1;
        }
        if entry.is_skipped {
            self.skipped_files += 1;
        }
        if entry.excluded_by_default {
            self.excluded_files += 1;
        } else {
            self.total_tokens += u64::from(entry.token_count);
        }
    }

    /// Record a visited directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a directory that hit a limit.
    pub fn record_truncation(&mut self) {
        self.truncated_dirs += 1;
    }

    /// Files that are in scope by default.
    pub fn included_files(&self) -> u64 {
        self.total_files
            .saturating_sub(self.excluded_files)
            .saturating_sub(self.skipped_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_record_file() {
        let mut stats = ScanStats::new();
        stats.record_file(&FileEntry::new_text("/a", "a", 10, SystemTime::now(), 4, None));
        stats.record_file(&FileEntry::new_binary("/b.png", "b.png", 20, SystemTime::now()));
        stats.record_file(
            &FileEntry::new_text("/c.py", "c.py", 5, SystemTime::now(), 9, None).with_excluded(true),
        );

        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size, 35);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.excluded_files, 1);
        assert_eq!(stats.total_tokens, 4);
        assert_eq!(stats.included_files(), 2);
    }
}
