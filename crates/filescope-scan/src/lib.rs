//! Directory scanning for filescope.
//!
//! `filescope-scan` walks a project root and produces a flat list of
//! classified [`FileEntry`] records. Key features:
//!
//! - **Pattern pruning**: ignored directories are never entered
//! - **Safety bounds** on entries, files and subdirectories per directory,
//!   plus total directory and depth limits
//! - **Chunked execution** via [`ScanJob::step`] so callers can yield
//! - **Parallel classification** of each directory's files via rayon
//! - **Per-root TTL cache** of finished results
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use filescope_ignore::{PatternResolver, ResolverConfig};
//! use filescope_scan::{DirectoryScanner, ScanConfig};
//!
//! let resolver = Arc::new(PatternResolver::new(ResolverConfig::default()));
//! let scanner = DirectoryScanner::new(ScanConfig::default(), resolver);
//!
//! let mut job = scanner.start(Path::new("/path/to/project")).unwrap();
//! while !job.step(25) {
//!     println!("{} files so far", job.progress().files_scanned);
//! }
//! let outcome = job.finish();
//! println!("{} files in {:?}", outcome.files.len(), outcome.duration);
//! ```

mod cache;
mod classify;
mod guard;
mod progress;
mod scanner;

pub use cache::DirectoryCache;
pub use classify::{BINARY_EXTENSIONS, Classifier, FileClass, has_binary_extension, looks_binary};
pub use guard::AppDirectoryGuard;
pub use progress::ScanProgress;
pub use scanner::{DirectoryScanner, ScanJob, ScanOutcome, is_scannable_path};

// Re-export core types for convenience
pub use filescope_core::{FileEntry, ScanConfig, ScanError, ScanStats, ScanWarning, WarningKind};
