//! Core types and traits for filescope.
//!
//! This crate provides the data structures shared by every part of the
//! indexing engine: file entries, watch events, configuration, errors,
//! the clock abstraction and the token counter contract.

mod clock;
mod config;
mod entry;
mod error;
mod path;
mod stats;
mod tokens;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_ALWAYS_IGNORED, DEFAULT_SKIP_DIRECTORIES, EngineConfig, EngineConfigBuilder,
    EngineConfigBuilderError, ScanConfig, ScanConfigBuilder, ScanConfigBuilderError, WatchConfig,
    WatchConfigBuilder, WatchConfigBuilderError,
};
pub use entry::{FileEntry, WatchEvent, WatchEventKind};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use path::{is_within, normalize_path, relative_path};
pub use stats::ScanStats;
pub use tokens::{EstimatingTokenCounter, TokenCounter, approximate_tokens};
