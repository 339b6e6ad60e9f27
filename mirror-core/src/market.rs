//! Market record mirrored from the platform

use serde::{Deserialize, Serialize};

/// Opaque market identifier assigned by the platform
pub type MarketId = String;

/// A mirrored binary market
///
/// The id is not part of the record; stores key records by [`MarketId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Market question as shown on the platform
    pub title: String,

    /// Current probability of YES, in `[0, 1]`
    pub probability: f64,

    /// Semantic embedding of `title`, once computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MarketRecord {
    /// Create a record without an embedding
    pub fn new(title: impl Into<String>, probability: f64) -> Self {
        Self {
            title: title.into(),
            probability,
            embedding: None,
        }
    }

    /// Attach an embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// Whether `p` is a valid probability
    pub fn is_valid_probability(p: f64) -> bool {
        (0.0..=1.0).contains(&p)
    }
}
