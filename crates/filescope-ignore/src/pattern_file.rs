//! On-disk format of saved pattern files.
//!
//! ```text
//! # DISABLED: **/*.log
//! # DISABLED: **/dist/
//! # USER PATTERNS:
//! *.py
//! !keep.py
//! ```
//!
//! Everything after the marker line is stored verbatim, so comments and blank
//! lines in the user text survive a save/load cycle. Patterns containing a
//! line break cannot be represented as disabled entries.

use std::collections::BTreeSet;

/// Prefix of a line recording one disabled system pattern.
pub const DISABLED_PREFIX: &str = "# DISABLED: ";

/// Line separating disabled entries from user text.
pub const USER_PATTERNS_MARKER: &str = "# USER PATTERNS:";

/// Parsed contents of a pattern file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFile {
    /// System patterns switched off by the user.
    pub disabled: BTreeSet<String>,
    /// Raw user pattern text.
    pub user_text: String,
}

impl PatternFile {
    /// Create a pattern file holding only user text.
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            disabled: BTreeSet::new(),
            user_text: user_text.into(),
        }
    }

    /// Replace the disabled set.
    pub fn with_disabled<I, S>(mut self, disabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled = disabled.into_iter().map(Into::into).collect();
        self
    }

    /// Render to the on-disk text form.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.user_text.len() + 64);
        for pattern in &self.disabled {
            out.push_str(DISABLED_PREFIX);
            out.push_str(pattern);
            out.push('\n');
        }
        out.push_str(USER_PATTERNS_MARKER);
        out.push('\n');
        out.push_str(&self.user_text);
        out
    }

    /// Parse the on-disk text form.
    ///
    /// Text without a marker line is treated as plain user text, minus any
    /// `# DISABLED:` lines it contains.
    pub fn parse(text: &str) -> Self {
        let mut disabled = BTreeSet::new();
        let mut plain = String::new();
        let mut offset = 0;

        for raw_line in text.split_inclusive('\n') {
            offset += raw_line.len();
            let line = raw_line.strip_suffix('\n').unwrap_or(raw_line);
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line == USER_PATTERNS_MARKER {
                return Self {
                    disabled,
                    user_text: text[offset..].to_string(),
                };
            }

            if let Some(pattern) = line.strip_prefix(DISABLED_PREFIX) {
                if !pattern.is_empty() {
                    disabled.insert(pattern.to_string());
                }
                continue;
            }

            plain.push_str(raw_line);
        }

        Self {
            disabled,
            user_text: plain,
        }
    }

    /// Pattern lines of the user text, without blanks and comments.
    pub fn patterns(&self) -> Vec<String> {
        self.user_text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Nothing disabled and no user text.
    pub fn is_empty(&self) -> bool {
        self.disabled.is_empty() && self.user_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_layout() {
        let file = PatternFile::new("*.py\n").with_disabled(["**/*.log"]);
        assert_eq!(
            file.serialize(),
            "# DISABLED: **/*.log\n# USER PATTERNS:\n*.py\n"
        );
    }

    #[test]
    fn test_round_trip_with_comments_and_blanks() {
        let file = PatternFile::new("# keep python out\n\n*.py\n\n!keep.py\n  \n")
            .with_disabled(["**/dist/", "**/*.log"]);
        assert_eq!(PatternFile::parse(&file.serialize()), file);
    }

    #[test]
    fn test_round_trip_user_text_containing_marker() {
        let file = PatternFile::new("a\n# USER PATTERNS:\n# DISABLED: fake\nb");
        assert_eq!(PatternFile::parse(&file.serialize()), file);
    }

    #[test]
    fn test_round_trip_empty() {
        let file = PatternFile::default();
        assert_eq!(PatternFile::parse(&file.serialize()), file);
    }

    #[test]
    fn test_parse_without_marker() {
        let file = PatternFile::parse("# DISABLED: **/*.log\n*.tmp\n# note\n");
        assert!(file.disabled.contains("**/*.log"));
        assert_eq!(file.user_text, "*.tmp\n# note\n");
        assert_eq!(file.patterns(), vec!["*.tmp".to_string()]);
    }

    #[test]
    fn test_parse_crlf() {
        let file = PatternFile::parse("# DISABLED: **/*.map\r\n# USER PATTERNS:\r\n*.py\r\n");
        assert!(file.disabled.contains("**/*.map"));
        assert_eq!(file.patterns(), vec!["*.py".to_string()]);
    }
}
