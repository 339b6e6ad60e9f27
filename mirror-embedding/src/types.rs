//! Core types for embeddings and similarity search

use serde::{Deserialize, Serialize};

/// Embedding vector (1536 dimensions for text-embedding-3-small)
pub type EmbeddingVector = Vec<f32>;

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Dimension of [`DEFAULT_EMBEDDING_MODEL`]
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Similarity match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// Market ID
    pub market_id: String,
    /// Cosine similarity score (-1.0 - 1.0)
    pub score: f64,
}

impl SimilarityMatch {
    /// Cosine distance, smaller is closer
    pub fn distance(&self) -> f64 {
        1.0 - self.score
    }
}
