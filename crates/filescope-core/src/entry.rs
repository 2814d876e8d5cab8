//! File entry and watch event types.

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A single discovered file.
///
/// `path` is absolute and always uses forward slashes, so entries compare the
/// same way on every host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Absolute, forward-slash path.
    pub path: String,

    /// File name (not full path).
    pub name: CompactString,

    /// Size in bytes.
    pub size: u64,

    /// Classified as binary; never read.
    pub is_binary: bool,

    /// Too large or unreadable.
    pub is_skipped: bool,

    /// Why the file could not be processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Tokens in the current content.
    pub token_count: u32,

    /// Tokens in the raw file content.
    pub uncompressed_token_count: u32,

    /// Content has been replaced by a compressed rendition.
    pub is_compressed: bool,

    /// Matched by the effective ignore patterns.
    pub excluded_by_default: bool,

    /// Last modification time.
    pub last_modified: DateTime<Utc>,

    /// Raw text of readable text files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Sentinel returned when the scan root is the application's own directory.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_app_directory: bool,
}

impl FileEntry {
    fn base(
        path: impl Into<String>,
        name: impl Into<CompactString>,
        size: u64,
        modified: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            is_binary: false,
            is_skipped: false,
            error: None,
            token_count: 0,
            uncompressed_token_count: 0,
            is_compressed: false,
            excluded_by_default: false,
            last_modified: DateTime::<Utc>::from(modified),
            content: None,
            is_app_directory: false,
        }
    }

    /// Create an entry for a readable text file.
    pub fn new_text(
        path: impl Into<String>,
        name: impl Into<CompactString>,
        size: u64,
        modified: SystemTime,
        token_count: u32,
        content: Option<String>,
    ) -> Self {
        Self {
            token_count,
            uncompressed_token_count: token_count,
            content,
            ..Self::base(path, name, size, modified)
        }
    }

    /// Create an entry for a binary file.
    pub fn new_binary(
        path: impl Into<String>,
        name: impl Into<CompactString>,
        size: u64,
        modified: SystemTime,
    ) -> Self {
        Self {
            is_binary: true,
            ..Self::base(path, name, size, modified)
        }
    }

    /// Create an entry for a file that could not be processed.
    pub fn new_skipped(
        path: impl Into<String>,
        name: impl Into<CompactString>,
        size: u64,
        modified: SystemTime,
        error: impl Into<String>,
    ) -> Self {
        Self {
            is_skipped: true,
            error: Some(error.into()),
            ..Self::base(path, name, size, modified)
        }
    }

    /// Create the sentinel returned for a scan of the application directory.
    pub fn app_directory(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            is_app_directory: true,
            is_skipped: true,
            ..Self::base(path, name, 0, SystemTime::UNIX_EPOCH)
        }
    }

    /// Mark the entry as matched by the ignore patterns.
    pub fn with_excluded(mut self, excluded: bool) -> Self {
        self.excluded_by_default = excluded;
        self
    }

    /// Included in the active set by default.
    pub fn is_included(&self) -> bool {
        !self.excluded_by_default && !self.is_skipped && !self.is_app_directory
    }

    /// Get the file extension, lowercased.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Kind of a delivered watch event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WatchEventKind {
    /// A file appeared.
    Add,
    /// A file's content or metadata changed.
    Change,
    /// A file disappeared.
    Delete,
}

/// A debounced filesystem change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: WatchEventKind,
    /// Absolute, forward-slash path.
    pub path: String,
}

impl WatchEvent {
    /// Create a new watch event.
    pub fn new(kind: WatchEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_entry_initializes_both_counts() {
        let entry = FileEntry::new_text("/p/a.ts", "a.ts", 10, SystemTime::now(), 7, None);
        assert_eq!(entry.token_count, 7);
        assert_eq!(entry.uncompressed_token_count, 7);
        assert!(!entry.is_binary);
        assert!(entry.is_included());
    }

    #[test]
    fn test_app_directory_sentinel() {
        let entry = FileEntry::app_directory("/opt/app");
        assert!(entry.is_app_directory);
        assert_eq!(entry.name.as_str(), "app");
        assert!(!entry.is_included());
    }

    #[test]
    fn test_extension() {
        let entry = FileEntry::new_binary("/p/Logo.PNG", "Logo.PNG", 1, SystemTime::now());
        assert_eq!(entry.extension().as_deref(), Some("png"));

        let dotfile = FileEntry::new_binary("/p/.gitignore", ".gitignore", 1, SystemTime::now());
        assert_eq!(dotfile.extension(), None);
    }

    #[test]
    fn test_watch_event_kind_display() {
        assert_eq!(WatchEventKind::Add.to_string(), "add");
        assert_eq!("delete".parse::<WatchEventKind>().unwrap(), WatchEventKind::Delete);
    }
}
