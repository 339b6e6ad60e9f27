//! Manifold REST API types

use mirror_core::{MarketId, MarketRecord};
use serde::Deserialize;

/// Base URL for the Manifold REST API
pub const MANIFOLD_API_BASE: &str = "https://api.manifold.markets";

/// Page size accepted by `search-markets`
pub const SEARCH_PAGE_SIZE: usize = 1000;

/// Market as returned by `/v0/search-markets`
///
/// Only the fields the mirror keeps are decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteMarket {
    pub id: MarketId,
    #[serde(alias = "title")]
    pub question: String,
    #[serde(default)]
    pub probability: Option<f64>,
}

impl LiteMarket {
    /// Convert to a mirror record, without embedding
    ///
    /// `None` when the market carries no probability (non-binary payloads
    /// can slip through the contract type filter).
    pub fn into_record(self) -> Option<(MarketId, MarketRecord)> {
        let probability = self.probability?;
        Some((self.id, MarketRecord::new(self.question, probability)))
    }
}
