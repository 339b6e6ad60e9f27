//! Token-budgeted batching of embedding requests
//!
//! Titles are packed greedily, in order, into batches whose summed token
//! count stays within the budget. A title that alone exceeds the budget is
//! sent as a batch of one. Output order always matches input order.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{
    client::Embedder,
    error::{EmbeddingError, Result},
    tokenizer::Tokenizer,
    types::{DEFAULT_EMBEDDING_MODEL, EmbeddingVector},
};

/// Default maximum tokens per embedding request
pub const DEFAULT_TOKEN_BUDGET: usize = 30_000;

/// Configuration for [`EmbeddingBatcher`]
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub model: String,
    pub token_budget: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            token_budget: DEFAULT_TOKEN_BUDGET,
        }
    }
}

/// Split `token_counts` into contiguous index ranges within `budget`
///
/// Ranges are non-empty, cover every index exactly once and appear in input
/// order.
pub fn plan_batches(token_counts: &[usize], budget: usize) -> Vec<Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut running = 0usize;

    for (i, &count) in token_counts.iter().enumerate() {
        if i > start && running.saturating_add(count) > budget {
            batches.push(start..i);
            start = i;
            running = count;
        } else {
            running = running.saturating_add(count);
        }
    }

    if start < token_counts.len() {
        batches.push(start..token_counts.len());
    }

    batches
}

/// Embeds sequences of titles through an [`Embedder`] within a token budget
pub struct EmbeddingBatcher {
    embedder: Arc<dyn Embedder>,
    tokenizer: Arc<dyn Tokenizer>,
    config: BatcherConfig,
}

impl EmbeddingBatcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        tokenizer: Arc<dyn Tokenizer>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            embedder,
            tokenizer,
            config,
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Embed every title, one embedder call per planned batch
    ///
    /// Fails with [`EmbeddingError::InternalConsistency`] if the embedder
    /// returns a different number of vectors than it was given.
    pub async fn embed_all<S: AsRef<str>>(&self, titles: &[S]) -> Result<Vec<EmbeddingVector>> {
        let counts: Vec<usize> = titles
            .iter()
            .map(|t| self.tokenizer.count_tokens(t.as_ref()))
            .collect();
        let batches = plan_batches(&counts, self.config.token_budget);

        info!(
            "[Batcher] Embedding {} titles in {} batches (budget {} tokens)",
            titles.len(),
            batches.len(),
            self.config.token_budget
        );

        let mut embeddings = Vec::with_capacity(titles.len());
        for range in batches {
            let inputs: Vec<String> = titles[range.clone()]
                .iter()
                .map(|t| t.as_ref().to_string())
                .collect();
            let tokens: usize = counts[range.clone()].iter().sum();
            debug!(
                "[Batcher] Flushing batch {}..{} ({} tokens)",
                range.start, range.end, tokens
            );

            let vectors = self.embedder.embed(&self.config.model, inputs).await?;
            if vectors.len() != range.len() {
                error!(
                    "[Batcher] Embedder returned {} vectors for {} inputs",
                    vectors.len(),
                    range.len()
                );
                return Err(EmbeddingError::InternalConsistency {
                    expected: range.len(),
                    actual: vectors.len(),
                });
            }
            embeddings.extend(vectors);
        }

        if embeddings.len() != titles.len() {
            return Err(EmbeddingError::InternalConsistency {
                expected: titles.len(),
                actual: embeddings.len(),
            });
        }

        Ok(embeddings)
    }
}
