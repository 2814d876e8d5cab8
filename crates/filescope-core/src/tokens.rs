//! Token counting contract.
//!
//! The exact tokenizer is an external collaborator. The engine only needs a
//! `count_tokens` that is cheap on huge inputs and never fails.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Count tokens. Must not panic.
    fn count_tokens(&self, text: &str) -> u32;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> u32 + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> u32 {
        self(text)
    }
}

/// Length-based approximation: one token per four bytes, rounded up.
pub fn approximate_tokens(text: &str) -> u32 {
    u32::try_from(text.len().div_ceil(4)).unwrap_or(u32::MAX)
}

/// Default counter.
///
/// Below `exact_limit` bytes it walks the text and estimates tokens the way a
/// byte-pair tokenizer splits it: word runs cost roughly one token per four
/// characters, punctuation one token per character, non-ASCII one token per
/// character, and a single space folds into the following word. Above the
/// limit it falls back to [`approximate_tokens`].
#[derive(Debug, Clone, Copy)]
pub struct EstimatingTokenCounter {
    exact_limit: usize,
}

impl EstimatingTokenCounter {
    /// Default size threshold for the detailed estimate (1 MiB).
    pub const DEFAULT_EXACT_LIMIT: usize = 1024 * 1024;

    /// Create a counter with the default threshold.
    pub fn new() -> Self {
        Self {
            exact_limit: Self::DEFAULT_EXACT_LIMIT,
        }
    }

    /// Create a counter with a custom threshold.
    pub fn with_exact_limit(exact_limit: usize) -> Self {
        Self { exact_limit }
    }

    fn estimate(text: &str) -> u64 {
        let mut tokens: u64 = 0;
        let mut word_len: u64 = 0;
        let mut space_run: u64 = 0;

        for ch in text.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                word_len += 1;
                space_run = 0;
                continue;
            }

            tokens += word_len.div_ceil(4);
            word_len = 0;

            if ch == ' ' || ch == '\t' {
                space_run += 1;
                // A lone space merges into the next word.
                if space_run > 1 && (space_run - 1) % 4 == 1 {
                    tokens += 1;
                }
            } else {
                space_run = 0;
                tokens += 1;
            }
        }

        tokens + word_len.div_ceil(4)
    }
}

impl Default for EstimatingTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter for EstimatingTokenCounter {
    fn count_tokens(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        if text.len() > self.exact_limit {
            return approximate_tokens(text);
        }
        u32::try_from(Self::estimate(text)).unwrap_or(u32::MAX)
    }
}
