//! Error types for embedding and store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Market not found: {0}")]
    NotFound(String),

    #[error("Market already exists: {0}")]
    AlreadyExists(String),

    /// A collaborator broke its contract (e.g. returned the wrong number of vectors)
    #[error("Internal consistency error: expected {expected} embeddings, got {actual}")]
    InternalConsistency { expected: usize, actual: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for EmbeddingError {
    fn from(e: rusqlite::Error) -> Self {
        EmbeddingError::Database(e.to_string())
    }
}
