//! Scan orchestration for filescope.
//!
//! [`IndexingEngine`] is the entry point for hosts. It serves file listings
//! from a per-root TTL cache, otherwise runs a chunked scan on the blocking
//! pool with an overall timeout. Only one scan is in flight at a time; a new
//! request supersedes the old one. Once a listing is delivered the engine
//! watches the root and patches its active file set as files change.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use filescope_core::EngineConfig;
//! use filescope_engine::{IndexingEngine, ScanStatus};
//! use filescope_ignore::{PatternResolver, ResolverConfig};
//!
//! # async fn run() {
//! let resolver = Arc::new(PatternResolver::new(ResolverConfig::default()));
//! let engine = IndexingEngine::new(EngineConfig::default(), resolver);
//!
//! let mut updates = engine.request_file_list(Path::new("/path/to/project"), false);
//! while let Some(update) = updates.recv().await {
//!     if update.status == ScanStatus::Complete {
//!         println!("{}", update.message);
//!     }
//! }
//! # }
//! ```

mod active;
mod engine;
mod error;
mod protocol;
mod session;

pub use active::ActiveFiles;
pub use engine::IndexingEngine;
pub use error::EngineError;
pub use protocol::{EngineEvent, EngineRequest, Reply, ScanStatus, ScanUpdate};
pub use session::{ScanSession, ScanSessions};
