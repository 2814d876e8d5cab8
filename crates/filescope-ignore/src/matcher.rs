//! Compiled gitignore matcher for one root.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use filescope_core::relative_path;

/// Compiled effective patterns for a root.
#[derive(Debug, Clone)]
pub struct Matcher {
    root: String,
    gitignore: Gitignore,
    rejected: Vec<String>,
}

impl Matcher {
    /// Compile `patterns` in order for `root` (normalized form).
    ///
    /// A pattern that fails to compile is logged and left out; the rest still
    /// apply.
    pub fn build(root: &str, patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let mut rejected = Vec::new();

        for pattern in patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                warn!(pattern = %pattern, error = %err, "skipping invalid ignore pattern");
                rejected.push(pattern.clone());
            }
        }

        let gitignore = match builder.build() {
            Ok(gitignore) => gitignore,
            Err(err) => {
                warn!(root = %root, error = %err, "failed to compile ignore patterns, matching nothing");
                Gitignore::empty()
            }
        };

        debug!(root = %root, patterns = gitignore.num_ignores() + gitignore.num_whitelists(), "built matcher");

        Self {
            root: root.to_string(),
            gitignore,
            rejected,
        }
    }

    /// A matcher that excludes nothing.
    pub fn empty(root: &str) -> Self {
        Self {
            root: root.to_string(),
            gitignore: Gitignore::empty(),
            rejected: Vec::new(),
        }
    }

    /// Normalized root the patterns are anchored to.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Root as a path.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Patterns that failed to compile.
    pub fn rejected_patterns(&self) -> &[String] {
        &self.rejected
    }

    /// Check a root-relative, forward-slash path.
    ///
    /// A path is excluded when it, or any of its parent directories, matches
    /// an ignore rule that is not overridden by a later negation.
    pub fn is_excluded(&self, relative: &str, is_dir: bool) -> bool {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(Path::new(relative), is_dir)
            .is_ignore()
    }

    /// Check an absolute, normalized path. Paths outside the root are never
    /// excluded.
    pub fn is_path_excluded(&self, path: &str, is_dir: bool) -> bool {
        relative_path(&self.root, path).is_some_and(|rel| self.is_excluded(rel, is_dir))
    }
}
