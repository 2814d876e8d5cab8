//! Pattern loading, persistence and matcher caching.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;
use strum::Display;
use tracing::{debug, info, warn};

use filescope_core::normalize_path;

use crate::defaults::DEFAULT_SYSTEM_PATTERNS;
use crate::error::PatternError;
use crate::matcher::Matcher;
use crate::pattern_file::PatternFile;
use crate::pattern_set::PatternSet;

/// File name of the per-root pattern file.
pub const LOCAL_PATTERN_FILE: &str = ".repo_ignore";

/// Which user tier a pattern file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PatternScope {
    /// Shared by every root.
    Global,
    /// Stored at the root of one project.
    Local,
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Location of the global pattern file. `None` keeps global patterns in
    /// memory only.
    pub global_path: Option<PathBuf>,

    /// Built-in system patterns, in evaluation order.
    pub system_patterns: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            global_path: dirs::config_dir().map(|d| d.join("filescope").join("global_ignore")),
            system_patterns: DEFAULT_SYSTEM_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ResolverConfig {
    /// Use a specific global pattern file.
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Keep global patterns in memory only.
    pub fn in_memory(mut self) -> Self {
        self.global_path = None;
        self
    }

    /// Replace the system pattern list.
    pub fn with_system_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Loads, persists and evaluates the three pattern tiers.
///
/// Built matchers are cached per root and only rebuilt after an explicit
/// change, so classification never touches the disk.
#[derive(Debug)]
pub struct PatternResolver {
    config: ResolverConfig,
    system_patterns: IndexSet<String>,
    /// Global file contents; `None` until first loaded.
    global: RwLock<Option<PatternFile>>,
    matchers: DashMap<String, Arc<Matcher>>,
}

impl PatternResolver {
    /// Create a resolver.
    pub fn new(config: ResolverConfig) -> Self {
        let system_patterns = config.system_patterns.iter().cloned().collect();
        Self {
            config,
            system_patterns,
            global: RwLock::new(None),
            matchers: DashMap::new(),
        }
    }

    /// Location of the global pattern file.
    pub fn global_path(&self) -> Option<&Path> {
        self.config.global_path.as_deref()
    }

    /// Location of a root's local pattern file.
    pub fn local_path(root: &Path) -> PathBuf {
        root.join(LOCAL_PATTERN_FILE)
    }

    /// Built-in system patterns.
    pub fn system_patterns(&self) -> &IndexSet<String> {
        &self.system_patterns
    }

    /// Currently disabled system patterns.
    pub fn disabled_system_patterns(&self) -> BTreeSet<String> {
        self.global_file().disabled
    }

    /// Read a pattern file from disk.
    ///
    /// A missing file yields an empty [`PatternFile`].
    pub fn load_patterns(
        &self,
        scope: PatternScope,
        root: Option<&Path>,
    ) -> Result<PatternFile, PatternError> {
        let file = match self.file_path(scope, root)? {
            Some(path) => read_pattern_file(&path)?,
            None => self.global.read().clone().unwrap_or_default(),
        };

        if scope == PatternScope::Global {
            *self.global.write() = Some(file.clone());
        }
        Ok(file)
    }

    /// Replace the user text of a tier and persist it.
    pub fn save_patterns(
        &self,
        scope: PatternScope,
        root: Option<&Path>,
        user_text: &str,
    ) -> Result<(), PatternError> {
        let file = match scope {
            PatternScope::Global => PatternFile {
                disabled: self.global_file().disabled,
                user_text: user_text.to_string(),
            },
            PatternScope::Local => PatternFile::new(user_text),
        };

        self.persist(scope, root, &file)?;
        info!(scope = %scope, "saved ignore patterns");
        Ok(())
    }

    /// Remove a tier's pattern file.
    ///
    /// Resetting the global tier also re-enables every system pattern.
    pub fn reset_patterns(&self, scope: PatternScope, root: Option<&Path>) -> Result<(), PatternError> {
        if let Some(path) = self.file_path(scope, root)? {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(PatternError::io(path, err)),
            }
        }

        match scope {
            PatternScope::Global => {
                *self.global.write() = Some(PatternFile::default());
                self.clear_cache(None);
            }
            PatternScope::Local => self.clear_cache(root),
        }
        info!(scope = %scope, "reset ignore patterns");
        Ok(())
    }

    /// Flip one system pattern between enabled and disabled.
    ///
    /// Returns the updated disabled set.
    pub fn toggle_system_pattern(&self, pattern: &str) -> Result<BTreeSet<String>, PatternError> {
        if !self.system_patterns.contains(pattern) {
            return Err(PatternError::UnknownSystemPattern {
                pattern: pattern.to_string(),
            });
        }

        let mut file = self.global_file();
        if !file.disabled.remove(pattern) {
            file.disabled.insert(pattern.to_string());
        }

        self.persist(PatternScope::Global, None, &file)?;
        debug!(pattern = %pattern, disabled = file.disabled.len(), "toggled system pattern");
        Ok(file.disabled)
    }

    /// Snapshot of every tier. `root` adds the local tier.
    pub fn pattern_set(&self, root: Option<&Path>) -> PatternSet {
        let global = self.global_file();
        let local_patterns = root.map(|root| match self.load_patterns(PatternScope::Local, Some(root)) {
            Ok(file) => file.patterns(),
            Err(err) => {
                warn!(root = %root.display(), error = %err, "failed to load local patterns, using none");
                Vec::new()
            }
        });

        PatternSet {
            system_patterns: self.system_patterns.clone(),
            disabled_system_patterns: global.disabled.clone(),
            global_patterns: global.patterns(),
            local_patterns,
        }
    }

    /// Compile a matcher from an explicit pattern list.
    pub fn build_matcher(root: &Path, patterns: &[String]) -> Matcher {
        Matcher::build(&normalize_path(root), patterns)
    }

    /// Cached matcher for `root`, built on first use.
    pub fn matcher(&self, root: &Path) -> Arc<Matcher> {
        let key = normalize_path(root);
        if let Some(matcher) = self.matchers.get(&key) {
            return Arc::clone(&matcher);
        }

        let set = self.pattern_set(Some(root));
        let matcher = Arc::new(Matcher::build(&key, &set.effective_patterns()));
        self.matchers.insert(key, Arc::clone(&matcher));
        matcher
    }

    /// Drop cached matchers: one root, or all of them.
    pub fn clear_cache(&self, root: Option<&Path>) {
        match root {
            Some(root) => {
                self.matchers.remove(&normalize_path(root));
            }
            None => self.matchers.clear(),
        }
    }

    fn file_path(&self, scope: PatternScope, root: Option<&Path>) -> Result<Option<PathBuf>, PatternError> {
        match scope {
            PatternScope::Global => Ok(self.config.global_path.clone()),
            PatternScope::Local => root
                .map(|root| Some(Self::local_path(root)))
                .ok_or(PatternError::MissingRoot),
        }
    }

    /// Global file contents, loading them once.
    fn global_file(&self) -> PatternFile {
        if let Some(file) = self.global.read().as_ref() {
            return file.clone();
        }
        match self.load_patterns(PatternScope::Global, None) {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "failed to load global patterns, using defaults");
                let file = PatternFile::default();
                *self.global.write() = Some(file.clone());
                file
            }
        }
    }

    fn persist(&self, scope: PatternScope, root: Option<&Path>, file: &PatternFile) -> Result<(), PatternError> {
        if let Some(path) = self.file_path(scope, root)? {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PatternError::io(parent, e))?;
            }
            std::fs::write(&path, file.serialize()).map_err(|e| PatternError::io(&path, e))?;
        }

        match scope {
            PatternScope::Global => {
                *self.global.write() = Some(file.clone());
                self.clear_cache(None);
            }
            PatternScope::Local => self.clear_cache(root),
        }
        Ok(())
    }
}

fn read_pattern_file(path: &Path) -> Result<PatternFile, PatternError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(PatternFile::parse(&text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PatternFile::default()),
        Err(err) => Err(PatternError::io(path, err)),
    }
}
