//! Merged view of the three pattern tiers.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Snapshot of every pattern tier for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    /// Built-in patterns, in evaluation order.
    pub system_patterns: IndexSet<String>,
    /// System patterns switched off by the user.
    pub disabled_system_patterns: BTreeSet<String>,
    /// Patterns shared by every root.
    pub global_patterns: Vec<String>,
    /// Patterns of the active root, if any.
    pub local_patterns: Option<Vec<String>>,
}

impl PatternSet {
    /// System patterns that are not disabled, in order.
    pub fn active_system_patterns(&self) -> impl Iterator<Item = &String> {
        self.system_patterns
            .iter()
            .filter(|p| !self.disabled_system_patterns.contains(*p))
    }

    /// Check whether a system pattern is currently active.
    pub fn is_system_pattern_enabled(&self, pattern: &str) -> bool {
        self.system_patterns.contains(pattern) && !self.disabled_system_patterns.contains(pattern)
    }

    /// Effective list: active system, then global, then local.
    pub fn effective_patterns(&self) -> Vec<String> {
        self.active_system_patterns()
            .chain(self.global_patterns.iter())
            .chain(self.local_patterns.iter().flatten())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PatternSet {
        PatternSet {
            system_patterns: ["**/*.log", "**/dist/", "**/*.map"]
                .into_iter()
                .map(String::from)
                .collect(),
            disabled_system_patterns: BTreeSet::from(["**/dist/".to_string()]),
            global_patterns: vec!["*.bak".to_string()],
            local_patterns: Some(vec!["*.py".to_string(), "!keep.log".to_string()]),
        }
    }

    #[test]
    fn test_effective_order_and_removal() {
        let set = sample();
        assert_eq!(
            set.effective_patterns(),
            vec!["**/*.log", "**/*.map", "*.bak", "*.py", "!keep.log"]
        );
    }

    #[test]
    fn test_is_system_pattern_enabled() {
        let set = sample();
        assert!(set.is_system_pattern_enabled("**/*.log"));
        assert!(!set.is_system_pattern_enabled("**/dist/"));
        assert!(!set.is_system_pattern_enabled("*.bak"));
    }

    #[test]
    fn test_without_local_tier() {
        let set = PatternSet {
            local_patterns: None,
            ..sample()
        };
        assert_eq!(set.effective_patterns().last().map(String::as_str), Some("*.bak"));
    }
}
