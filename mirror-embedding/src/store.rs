//! Market store: keyed records plus embedding-based nearest-neighbor queries
//!
//! Below `index_threshold` records every query is an exact linear scan. Once
//! the store reaches the threshold an IVF index is built by the maintenance
//! check that follows each successful `add`. Later adds are appended to the
//! existing index, so they are visible to the next query; the centroids are
//! retrained only once the index has grown by `retrain_growth` since its last
//! build, or when [`MarketStore::rebuild_index`] is called.

use std::sync::Arc;

use mirror_core::MarketRecord;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::StoreBackend,
    error::{EmbeddingError, Result},
    index::{IvfIndex, IvfParams},
    types::{DEFAULT_EMBEDDING_DIMENSION, SimilarityMatch},
};

/// Record count at which the approximate index is built
pub const DEFAULT_INDEX_THRESHOLD: usize = 10_000;

/// Fraction of appended vectors that triggers a retrain
pub const DEFAULT_RETRAIN_GROWTH: f64 = 0.5;

/// Configuration for [`MarketStore`]
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Required length of every stored embedding
    pub dimension: usize,
    pub index_threshold: usize,
    /// Retrain once vectors appended since the last build exceed this
    /// fraction of the vectors the centroids were trained on
    pub retrain_growth: f64,
    pub index: IvfParams,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            index_threshold: DEFAULT_INDEX_THRESHOLD,
            retrain_growth: DEFAULT_RETRAIN_GROWTH,
            index: IvfParams::default(),
        }
    }
}

/// Statistics about the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub record_count: usize,
    pub indexed_count: Option<usize>,
}

/// Authoritative collection of market records
pub struct MarketStore {
    backend: Arc<dyn StoreBackend>,
    index: RwLock<Option<IvfIndex>>,
    config: StoreConfig,
}

impl MarketStore {
    pub fn new(backend: Arc<dyn StoreBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            index: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn check_dimension(&self, record: &MarketRecord) -> Result<()> {
        match &record.embedding {
            Some(e) if e.len() != self.config.dimension => Err(EmbeddingError::InvalidDimension {
                expected: self.config.dimension,
                actual: e.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Insert a new record, then run the index maintenance check
    #[instrument(skip(self, record))]
    pub fn add(&self, id: &str, record: MarketRecord) -> Result<()> {
        self.check_dimension(&record)?;
        self.backend.insert(id, &record)?;
        debug!("[Store] Added market {}", id);
        self.maintain_index(id, &record)
    }

    pub fn get(&self, id: &str) -> Result<MarketRecord> {
        self.backend.select(id)
    }

    /// Replace a record's fields; the index is left untouched
    #[instrument(skip(self, record))]
    pub fn update(&self, id: &str, record: MarketRecord) -> Result<()> {
        self.check_dimension(&record)?;
        self.backend.update(id, &record)
    }

    /// Remove a record; `NotFound` if absent, like `get` and `update`
    pub fn delete(&self, id: &str) -> Result<()> {
        self.backend.delete(id)?;
        info!("[Store] Deleted market {}", id);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.backend.contains(id)
    }

    pub fn len(&self) -> Result<usize> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn has_index(&self) -> bool {
        self.index.read().is_some()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            record_count: self.len()?,
            indexed_count: self.index.read().as_ref().map(IvfIndex::len),
        })
    }

    /// Ids of the `limit` records closest to `query`, closest first
    ///
    /// Ties resolve in insertion order.
    pub fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<String>> {
        Ok(self
            .nearest_matches(query, limit)?
            .into_iter()
            .map(|m| m.market_id)
            .collect())
    }

    /// Like [`MarketStore::nearest`] but with similarity scores
    pub fn nearest_matches(&self, query: &[f32], limit: usize) -> Result<Vec<SimilarityMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if self.len()? >= self.config.index_threshold {
            if let Some(index) = self.index.read().as_ref() {
                // The index may still hold deleted records
                let mut live = Vec::with_capacity(limit);
                for m in index.search(query, limit) {
                    if self.backend.contains(&m.market_id)? {
                        live.push(m);
                    }
                }
                return Ok(live);
            }
        }

        self.backend.nearest_by_vector(query, limit)
    }

    /// Build the index at the threshold, append to it afterwards, and
    /// retrain it once the appended share passes `retrain_growth`
    fn maintain_index(&self, id: &str, record: &MarketRecord) -> Result<()> {
        let mut guard = self.index.write();
        let stale = match guard.as_mut() {
            Some(index) => {
                if let Some(embedding) = &record.embedding {
                    index.insert(id, embedding);
                }
                index.appended() as f64 > index.trained() as f64 * self.config.retrain_growth
            }
            None => self.len()? >= self.config.index_threshold,
        };
        if !stale {
            return Ok(());
        }

        let retrain = guard.is_some();
        *guard = IvfIndex::build(self.backend.embeddings()?, self.config.index);
        match guard.as_ref() {
            Some(index) if retrain => info!(
                "[Store] Retrained vector index over {} embeddings",
                index.len()
            ),
            Some(index) => info!(
                "[Store] Created vector index over {} embeddings",
                index.len()
            ),
            None => warn!("[Store] Store reached the index threshold but holds no embeddings"),
        }
        Ok(())
    }

    /// Rebuild the index from current content, regardless of its state
    pub fn rebuild_index(&self) -> Result<()> {
        let rebuilt = IvfIndex::build(self.backend.embeddings()?, self.config.index);
        let indexed = rebuilt.as_ref().map(IvfIndex::len).unwrap_or(0);
        *self.index.write() = rebuilt;
        info!("[Store] Rebuilt vector index over {} embeddings", indexed);
        Ok(())
    }
}
