//! Path normalization helpers.
//!
//! Every path that leaves the engine is absolute and uses forward slashes.
//! Normalization is purely lexical: symlinks are never resolved.

use std::path::{Component, Path, PathBuf};

/// Normalize a path to its absolute, forward-slash form.
///
/// `.` and `..` components are folded lexically and trailing separators are
/// dropped (except for a bare root).
pub fn normalize_path(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }

    let mut normalized = cleaned.to_string_lossy().replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') && !normalized.ends_with(":/") {
        normalized.pop();
    }
    normalized
}

/// Get `path` relative to `root`, both in normalized form.
///
/// Returns `None` when `path` is not strictly below `root`.
pub fn relative_path<'a>(root: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    if root.ends_with('/') {
        return (!rest.is_empty()).then_some(rest);
    }
    let rest = rest.strip_prefix('/')?;
    (!rest.is_empty()).then_some(rest)
}

/// Check whether `path` equals `root` or lies below it.
pub fn is_within(root: &str, path: &str) -> bool {
    path == root || relative_path(root, path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dots() {
        assert_eq!(normalize_path("/a/b/../c/./d/"), "/a/c/d");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_normalize_relative_becomes_absolute() {
        let normalized = normalize_path("some/dir");
        assert!(normalized.starts_with('/') || normalized.chars().nth(1) == Some(':'));
        assert!(normalized.ends_with("some/dir"));
        assert!(!normalized.contains('\\'));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/root", "/root/src/a.ts"), Some("src/a.ts"));
        assert_eq!(relative_path("/root", "/root"), None);
        assert_eq!(relative_path("/root", "/rootless/a.ts"), None);
        assert_eq!(relative_path("/", "/etc/hosts"), Some("etc/hosts"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/root", "/root"));
        assert!(is_within("/root", "/root/a"));
        assert!(!is_within("/root", "/root2/a"));
    }
}
