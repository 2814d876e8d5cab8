//! Layered ignore-pattern resolution for filescope.
//!
//! Patterns come from three tiers, merged in this order:
//!
//! 1. **System** patterns: built in, individually disableable, never deleted
//! 2. **Global** patterns: user-authored, shared by every root
//! 3. **Local** patterns: user-authored, stored in `<root>/.repo_ignore`
//!
//! All tiers use gitignore syntax. A later tier overrides an earlier one only
//! through `!` negation; a disabled system pattern is simply absent from the
//! effective list.
//!
//! ```rust,no_run
//! use filescope_ignore::{PatternResolver, PatternScope, ResolverConfig};
//! use std::path::Path;
//!
//! let resolver = PatternResolver::new(ResolverConfig::default());
//! let root = Path::new("/path/to/project");
//!
//! resolver.save_patterns(PatternScope::Local, Some(root), "*.py\n").unwrap();
//! let matcher = resolver.matcher(root);
//! assert!(matcher.is_excluded("app.py", false));
//! ```

mod defaults;
mod error;
mod matcher;
mod pattern_file;
mod pattern_set;
mod resolver;

pub use defaults::DEFAULT_SYSTEM_PATTERNS;
pub use error::PatternError;
pub use matcher::Matcher;
pub use pattern_file::{DISABLED_PREFIX, PatternFile, USER_PATTERNS_MARKER};
pub use pattern_set::PatternSet;
pub use resolver::{LOCAL_PATTERN_FILE, PatternResolver, PatternScope, ResolverConfig};
