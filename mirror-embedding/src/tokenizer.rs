//! Token counting for embedding budgets

use tiktoken_rs::CoreBPE;

use crate::error::{EmbeddingError, Result};

/// Tokenizer collaborator
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// `cl100k_base` tokenizer, the encoding used by the text-embedding-3 models
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_tokenizer() {
        let words = |text: &str| text.split_whitespace().count();
        assert_eq!(words.count_tokens("Will X happen?"), 3);
    }

    #[test]
    fn test_cl100k_counts_tokens() {
        let tokenizer = TiktokenTokenizer::cl100k().unwrap();
        assert!(tokenizer.count_tokens("Will Bitcoin hit $100k?") > 0);
        assert_eq!(tokenizer.count_tokens(""), 0);
    }
}
