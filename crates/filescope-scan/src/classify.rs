//! Binary/text and size classification of single files.

use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use filescope_core::{EstimatingTokenCounter, FileEntry, ScanConfig, TokenCounter};
use tracing::debug;

/// Extensions that are always treated as binary and never read.
pub const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "tif", "psd", "heic", "avif",
    "icns", "svgz",
    // Audio and video
    "mp3", "mp4", "wav", "ogg", "flac", "aac", "m4a", "avi", "mov", "mkv", "webm", "wmv", "flv",
    // Archives
    "zip", "tar", "gz", "tgz", "bz2", "xz", "7z", "rar", "zst", "jar", "war",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    // Executables and libraries
    "exe", "dll", "so", "dylib", "a", "lib", "o", "obj", "bin", "class", "pyc", "pyo", "wasm",
    "app", "dmg", "iso", "msi", "deb", "rpm", "apk",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Data
    "sqlite", "sqlite3", "db", "dat", "pkl", "npy", "npz", "parquet",
];

/// Outcome of classifying a file from its name and size alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Known binary extension.
    Binary,
    /// Larger than the configured maximum.
    Oversized,
    /// Candidate for reading.
    Text,
}

/// Check a file name against the binary extension table.
pub fn has_binary_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Check whether a content prefix looks binary (contains NUL).
pub fn looks_binary(bytes: &[u8], sniff_bytes: usize) -> bool {
    bytes.iter().take(sniff_bytes).any(|&b| b == 0)
}

/// Turns a file into a [`FileEntry`].
#[derive(Clone)]
pub struct Classifier {
    max_file_size: u64,
    sniff_bytes: usize,
    include_content: bool,
    counter: Arc<dyn TokenCounter>,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("max_file_size", &self.max_file_size)
            .field("sniff_bytes", &self.sniff_bytes)
            .field("include_content", &self.include_content)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Create a classifier with the default token counter.
    pub fn new(config: &ScanConfig) -> Self {
        Self::with_counter(config, Arc::new(EstimatingTokenCounter::new()))
    }

    /// Create a classifier with a specific token counter.
    pub fn with_counter(config: &ScanConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            max_file_size: config.max_file_size,
            sniff_bytes: config.binary_sniff_bytes,
            include_content: config.include_content,
            counter,
        }
    }

    /// The token counter in use.
    pub fn counter(&self) -> &Arc<dyn TokenCounter> {
        &self.counter
    }

    /// Classify by name and size without touching the file.
    pub fn classify(&self, name: &str, size: u64) -> FileClass {
        if has_binary_extension(name) {
            FileClass::Binary
        } else if size > self.max_file_size {
            FileClass::Oversized
        } else {
            FileClass::Text
        }
    }

    /// Build an entry for `path`, reading it only when it may be text.
    ///
    /// Never fails: read errors end up on the entry.
    pub fn entry(&self, path: &Path, normalized: String, name: &str, metadata: &Metadata) -> FileEntry {
        let size = metadata.len();
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        match self.classify(name, size) {
            FileClass::Binary => FileEntry::new_binary(normalized, name, size, modified),
            FileClass::Oversized => {
                FileEntry::new_skipped(normalized, name, size, modified, self.oversized_message())
            }
            FileClass::Text => match std::fs::read(path) {
                Ok(bytes) => self.text_entry(normalized, name, size, modified, bytes),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "failed to read file");
                    FileEntry::new_skipped(normalized, name, size, modified, format!("Read error: {err}"))
                }
            },
        }
    }

    /// Build an entry for a pattern-excluded file from metadata alone.
    ///
    /// The file is never opened, so it has no content and no token count.
    pub fn excluded_entry(&self, normalized: String, name: &str, metadata: &Metadata) -> FileEntry {
        let size = metadata.len();
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let entry = match self.classify(name, size) {
            FileClass::Binary => FileEntry::new_binary(normalized, name, size, modified),
            FileClass::Oversized => {
                FileEntry::new_skipped(normalized, name, size, modified, self.oversized_message())
            }
            FileClass::Text => FileEntry::new_text(normalized, name, size, modified, 0, None),
        };
        entry.with_excluded(true)
    }

    fn oversized_message(&self) -> String {
        format!(
            "File too large to process ({} MB limit)",
            self.max_file_size / (1024 * 1024)
        )
    }

    fn text_entry(
        &self,
        normalized: String,
        name: &str,
        size: u64,
        modified: SystemTime,
        bytes: Vec<u8>,
    ) -> FileEntry {
        if looks_binary(&bytes, self.sniff_bytes) {
            return FileEntry::new_binary(normalized, name, size, modified);
        }

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        let tokens = self.counter.count_tokens(&text);
        let content = self.include_content.then_some(text);
        FileEntry::new_text(normalized, name, size, modified, tokens, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classifier(max_file_size: u64) -> Classifier {
        let config = ScanConfig::builder()
            .max_file_size(max_file_size)
            .build()
            .unwrap();
        Classifier::new(&config)
    }

    #[test]
    fn test_binary_extensions() {
        assert!(has_binary_extension("logo.png"));
        assert!(has_binary_extension("LOGO.PNG"));
        assert!(has_binary_extension("archive.tar.gz"));
        assert!(!has_binary_extension("main.rs"));
        assert!(!has_binary_extension(".png"));
        assert!(!has_binary_extension("Makefile"));
    }

    #[test]
    fn test_classify_order() {
        let classifier = classifier(100);
        assert_eq!(classifier.classify("a.png", 1_000), FileClass::Binary);
        assert_eq!(classifier.classify("a.txt", 1_000), FileClass::Oversized);
        assert_eq!(classifier.classify("a.txt", 100), FileClass::Text);
    }

    #[test]
    fn test_nul_bytes_reclassify_as_binary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.dat2");
        fs::write(&path, b"abc\0def").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let entry = classifier(1024).entry(&path, "/x/blob.dat2".into(), "blob.dat2", &metadata);
        assert!(entry.is_binary);
        assert_eq!(entry.token_count, 0);
        assert!(entry.content.is_none());
    }

    #[test]
    fn test_oversized_is_skipped_with_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.txt");
        fs::write(&path, "x".repeat(64)).unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let entry = classifier(16).entry(&path, "/x/big.txt".into(), "big.txt", &metadata);
        assert!(entry.is_skipped);
        assert!(entry.error.is_some());
        assert_eq!(entry.size, 64);
    }

    #[test]
    fn test_text_entry_counts_tokens() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.ts");
        fs::write(&path, "export const answer = 42;\n").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let entry = classifier(1024).entry(&path, "/x/a.ts".into(), "a.ts", &metadata);
        assert!(!entry.is_binary);
        assert!(!entry.is_skipped);
        assert!(entry.token_count > 0);
        assert_eq!(entry.token_count, entry.uncompressed_token_count);
        assert_eq!(entry.content.as_deref(), Some("export const answer = 42;\n"));
    }

    #[test]
    fn test_excluded_entry_is_never_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("trace.log");
        fs::write(&path, "line one\nline two\n").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let entry = classifier(1024).excluded_entry("/x/trace.log".into(), "trace.log", &metadata);
        assert!(entry.excluded_by_default);
        assert!(!entry.is_skipped);
        assert_eq!(entry.size, 18);
        assert_eq!(entry.token_count, 0);
        assert!(entry.content.is_none());

        let big = classifier(4).excluded_entry("/x/trace.log".into(), "trace.log", &metadata);
        assert!(big.is_skipped);
    }
}
