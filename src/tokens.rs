//! Token accounting for file records

/// Counts tokens the way the answer model would see them
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Cheap approximation: one token per four characters, rounded up
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenizer;

impl HeuristicTokenizer {
    const CHARS_PER_TOKEN: usize = 4;
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(Self::CHARS_PER_TOKEN)
    }
}
