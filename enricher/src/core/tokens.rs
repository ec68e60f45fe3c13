//! Token counting seam.
//!
//! The pipeline never tokenizes text itself; it asks a [`TokenCounter`]. The
//! production counter lives in `io::tokenizer`, tests use deterministic ones.

/// Counts tokens in a piece of text.
pub trait TokenCounter {
    fn count(&self, text: &str) -> u64;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> u64,
{
    fn count(&self, text: &str) -> u64 {
        self(text)
    }
}

/// Coarse estimate: one token per `chars_per_token` bytes, rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicCounter {
    pub chars_per_token: usize,
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> u64 {
        (text.len() / self.chars_per_token.max(1)) as u64
    }
}
