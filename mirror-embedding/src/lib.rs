//! Embeddings, token-budgeted batching and the vector-indexed market store
//!
//! This crate provides semantic search over mirrored prediction markets
//! using vector embeddings from OpenAI's text-embedding-3-small model.
//!
//! ## Features
//! - Generate embeddings for market titles in token-budgeted batches
//! - Calculate cosine similarity between embeddings
//! - Store market records in memory or SQLite
//! - Nearest-neighbor queries, exact or through an IVF index past a size threshold

pub mod backend;
pub mod batcher;
pub mod client;
pub mod error;
pub mod index;
pub mod similarity;
pub mod sqlite;
pub mod store;
pub mod tokenizer;
pub mod types;

pub use backend::{MemoryBackend, StoreBackend};
pub use batcher::{BatcherConfig, EmbeddingBatcher, plan_batches};
pub use client::{Embedder, EmbeddingClient};
pub use error::{EmbeddingError, Result};
pub use index::{IvfIndex, IvfParams};
pub use similarity::{cosine_similarity, find_nearest};
pub use sqlite::SqliteBackend;
pub use store::{MarketStore, StoreConfig, StoreStats};
pub use tokenizer::{TiktokenTokenizer, Tokenizer};
pub use types::{EmbeddingVector, SimilarityMatch};
