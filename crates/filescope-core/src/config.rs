//! Scan, watch and engine configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Directory names that are never entered by the scanner.
pub const DEFAULT_SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "dist",
    "build",
    "out",
    "target",
    "venv",
    ".venv",
    "env",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".next",
    ".nuxt",
    ".cache",
    ".gradle",
    ".idea",
    ".vscode",
    "coverage",
    "vendor",
    "bower_components",
];

/// Directory names the watcher drops regardless of pattern configuration.
pub const DEFAULT_ALWAYS_IGNORED: &[&str] = &["node_modules", ".git", "dist", "build"];

/// Configuration for a directory scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Files larger than this are recorded as skipped instead of read.
    #[builder(default = "200 * 1024 * 1024")]
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// A directory listing with more entries than this is abandoned.
    #[builder(default = "10_000")]
    #[serde(default = "default_max_entries_per_directory")]
    pub max_entries_per_directory: usize,

    /// Files processed per directory; the rest are silently dropped.
    #[builder(default = "1_000")]
    #[serde(default = "default_max_files_per_directory")]
    pub max_files_per_directory: usize,

    /// Sibling subdirectories recursed into per directory.
    #[builder(default = "100")]
    #[serde(default = "default_max_subdirectories_per_level")]
    pub max_subdirectories_per_level: usize,

    /// Total directories visited in one scan.
    #[builder(default = "20_000")]
    #[serde(default = "default_max_directories")]
    pub max_directories: usize,

    /// Maximum recursion depth below the root.
    #[builder(default = "20")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Keep the text of readable files on their entries.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_content: bool,

    /// Bytes inspected for NUL when deciding whether unknown files are binary.
    #[builder(default = "8192")]
    #[serde(default = "default_sniff_bytes")]
    pub binary_sniff_bytes: usize,

    /// Directory names skipped by name before any pattern evaluation.
    #[builder(default = "default_skip_directories()")]
    #[serde(default = "default_skip_directories")]
    pub skip_directories: Vec<String>,

    /// Installation directory of the running application. `None` detects it
    /// from the current executable.
    #[builder(default)]
    #[serde(default)]
    pub app_directory: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    200 * 1024 * 1024
}

fn default_max_entries_per_directory() -> usize {
    10_000
}

fn default_max_files_per_directory() -> usize {
    1_000
}

fn default_max_subdirectories_per_level() -> usize {
    100
}

fn default_max_directories() -> usize {
    20_000
}

fn default_max_depth() -> u32 {
    20
}

fn default_sniff_bytes() -> usize {
    8192
}

fn default_skip_directories() -> Vec<String> {
    DEFAULT_SKIP_DIRECTORIES.iter().map(|s| s.to_string()).collect()
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_files_per_directory == Some(0) {
            return Err("max_files_per_directory must be at least 1".to_string());
        }
        if self.max_directories == Some(0) {
            return Err("max_directories must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Check whether a directory name is on the skip list.
    pub fn is_skipped_directory(&self, name: &str) -> bool {
        self.skip_directories.iter().any(|d| d == name)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_entries_per_directory: default_max_entries_per_directory(),
            max_files_per_directory: default_max_files_per_directory(),
            max_subdirectories_per_level: default_max_subdirectories_per_level(),
            max_directories: default_max_directories(),
            max_depth: default_max_depth(),
            include_content: true,
            binary_sniff_bytes: default_sniff_bytes(),
            skip_directories: default_skip_directories(),
            app_directory: None,
        }
    }
}

/// Configuration for live file watching.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct WatchConfig {
    /// Quiet window before a burst of events for a path is delivered.
    #[builder(default = "Duration::from_millis(300)")]
    pub debounce: Duration,

    /// Depth below the root reported by the native engine.
    #[builder(default = "5")]
    pub native_max_depth: usize,

    /// Depth below the root the polling engine registers watches for.
    #[builder(default = "4")]
    pub polling_max_depth: usize,

    /// Subdirectories per level the polling engine registers.
    #[builder(default = "50")]
    pub polling_max_subdirectories: usize,

    /// Upper bound on low-level watches held by either engine.
    #[builder(default = "1000")]
    pub max_watchers: usize,

    /// How often the polling engine rescans watched directories.
    #[builder(default = "Duration::from_secs(1)")]
    pub poll_interval: Duration,

    /// Hold add/change events until the file size stops moving.
    #[builder(default = "true")]
    pub await_write_finish: bool,

    /// Directory names ignored regardless of pattern configuration.
    #[builder(default = "default_always_ignored()")]
    pub always_ignored: Vec<String>,

    /// Capacity of the raw event channel between backend and debouncer.
    #[builder(default = "1024")]
    pub channel_size: usize,
}

fn default_always_ignored() -> Vec<String> {
    DEFAULT_ALWAYS_IGNORED.iter().map(|s| s.to_string()).collect()
}

impl WatchConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_watchers == Some(0) {
            return Err("max_watchers must be at least 1".to_string());
        }
        if self.channel_size == Some(0) {
            return Err("channel_size must be at least 1".to_string());
        }
        Ok(())
    }
}

impl WatchConfig {
    /// Create a new watch config builder.
    pub fn builder() -> WatchConfigBuilder {
        WatchConfigBuilder::default()
    }

    /// Check whether a path component is on the always-ignored list.
    pub fn is_always_ignored(&self, component: &str) -> bool {
        self.always_ignored.iter().any(|d| d == component)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            native_max_depth: 5,
            polling_max_depth: 4,
            polling_max_subdirectories: 50,
            max_watchers: 1000,
            poll_interval: Duration::from_secs(1),
            await_write_finish: true,
            always_ignored: default_always_ignored(),
            channel_size: 1024,
        }
    }
}

/// Configuration for the indexing engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct EngineConfig {
    /// Scanner limits.
    #[builder(default)]
    pub scan: ScanConfig,

    /// Watcher settings.
    #[builder(default)]
    pub watch: WatchConfig,

    /// How long a cached directory listing stays valid.
    #[builder(default = "Duration::from_secs(5 * 60)")]
    pub cache_ttl: Duration,

    /// Overall limit for one scan request.
    #[builder(default = "Duration::from_secs(120)")]
    pub scan_timeout: Duration,

    /// Roots with fewer top-level entries than this scan in small chunks.
    #[builder(default = "50")]
    pub small_root_threshold: usize,

    /// Directories per chunk for small roots.
    #[builder(default = "5")]
    pub small_chunk_size: usize,

    /// Directories per chunk for everything else.
    #[builder(default = "25")]
    pub chunk_size: usize,

    /// Arm the file watcher after every completed scan.
    #[builder(default = "true")]
    pub watch_after_scan: bool,

    /// Capacity of scan update channels.
    #[builder(default = "100")]
    pub update_channel_size: usize,

    /// Capacity of the engine event broadcast.
    #[builder(default = "256")]
    pub event_channel_size: usize,
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Chunk size for a root with `top_level_entries` direct children.
    pub fn chunk_size_for(&self, top_level_entries: usize) -> usize {
        let size = if top_level_entries < self.small_root_threshold {
            self.small_chunk_size
        } else {
            self.chunk_size
        };
        size.max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            watch: WatchConfig::default(),
            cache_ttl: Duration::from_secs(5 * 60),
            scan_timeout: Duration::from_secs(120),
            small_root_threshold: 50,
            small_chunk_size: 5,
            chunk_size: 25,
            watch_after_scan: true,
            update_channel_size: 100,
            event_channel_size: 256,
        }
    }
}
