//! Bulk import of open binary markets into the store
//!
//! New markets are embedded through the token-budgeted batcher and added.
//! Markets already in the store only get their title and probability
//! refreshed; their embedding is kept as is.

use std::collections::HashSet;
use std::sync::Arc;

use mirror_core::{MarketId, MarketRecord, MirrorError};
use mirror_embedding::{EmbeddingBatcher, EmbeddingError, MarketStore};
use mirror_manifold::{LiteMarket, ManifoldClient};
use tracing::{debug, info, warn};

/// Counts from one import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Newly added, with embeddings
    pub inserted: usize,
    /// Already present; title and probability refreshed
    pub refreshed: usize,
    /// Duplicates within the fetch or markets without a probability
    pub skipped: usize,
}

/// Errors that abort an import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("API error: {0}")]
    Api(#[from] MirrorError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

pub struct MarketImporter {
    store: Arc<MarketStore>,
    batcher: EmbeddingBatcher,
}

impl MarketImporter {
    pub fn new(store: Arc<MarketStore>, batcher: EmbeddingBatcher) -> Self {
        Self { store, batcher }
    }

    /// Fetch every open binary market and import it
    pub async fn import_from(&self, client: &ManifoldClient) -> Result<ImportReport, ImportError> {
        let markets = client.fetch_open_binary_markets().await?;
        self.import(markets).await
    }

    pub async fn import(&self, markets: Vec<LiteMarket>) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();
        let mut seen = HashSet::new();
        let mut fresh: Vec<(MarketId, MarketRecord)> = Vec::new();

        for market in markets {
            let Some((id, record)) = market.into_record() else {
                report.skipped += 1;
                continue;
            };
            if !seen.insert(id.clone()) {
                debug!("[Importer] Skipping duplicate market {}", id);
                report.skipped += 1;
                continue;
            }

            if self.store.contains(&id)? {
                self.refresh(&id, record)?;
                report.refreshed += 1;
            } else {
                fresh.push((id, record));
            }
        }

        if !fresh.is_empty() {
            let titles: Vec<&str> = fresh.iter().map(|(_, r)| r.title.as_str()).collect();
            let embeddings = self.batcher.embed_all(&titles).await?;

            for ((id, record), embedding) in fresh.into_iter().zip(embeddings) {
                self.store.add(&id, record.with_embedding(embedding))?;
                report.inserted += 1;
            }
        }

        if report.skipped > 0 {
            warn!("[Importer] Skipped {} markets", report.skipped);
        }
        info!(
            "[Importer] Import complete: {} inserted, {} refreshed",
            report.inserted, report.refreshed
        );
        Ok(report)
    }

    fn refresh(&self, id: &str, incoming: MarketRecord) -> Result<(), EmbeddingError> {
        let mut record = self.store.get(id)?;
        if record.title == incoming.title && record.probability == incoming.probability {
            return Ok(());
        }
        record.title = incoming.title;
        record.probability = incoming.probability;
        self.store.update(id, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mirror_embedding::{BatcherConfig, Embedder, EmbeddingVector, MemoryBackend, StoreConfig};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingEmbedder {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(
            &self,
            _model: &str,
            inputs: Vec<String>,
        ) -> mirror_embedding::Result<Vec<EmbeddingVector>> {
            let out = inputs
                .iter()
                .map(|s| vec![s.len() as f32, 1.0, 0.0])
                .collect();
            self.calls.lock().push(inputs);
            Ok(out)
        }
    }

    fn market(id: &str, question: &str, probability: Option<f64>) -> LiteMarket {
        LiteMarket {
            id: id.to_string(),
            question: question.to_string(),
            probability,
        }
    }

    fn importer(embedder: Arc<CountingEmbedder>) -> (MarketImporter, Arc<MarketStore>) {
        let store = Arc::new(MarketStore::new(
            Arc::new(MemoryBackend::new()),
            StoreConfig {
                dimension: 3,
                ..StoreConfig::default()
            },
        ));
        let batcher = EmbeddingBatcher::new(
            embedder,
            Arc::new(|text: &str| text.split_whitespace().count()),
            BatcherConfig::default(),
        );
        (MarketImporter::new(store.clone(), batcher), store)
    }

    #[tokio::test]
    async fn test_import_embeds_in_one_batch() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (importer, store) = importer(embedder.clone());

        let report = importer
            .import(vec![
                market("a", "Will A happen?", Some(0.1)),
                market("b", "Will B happen?", Some(0.2)),
                market("c", "Will C happen?", Some(0.3)),
            ])
            .await
            .unwrap();

        assert_eq!(
            report,
            ImportReport {
                inserted: 3,
                refreshed: 0,
                skipped: 0
            }
        );
        assert_eq!(embedder.calls.lock().len(), 1);
        assert_eq!(store.len().unwrap(), 3);
        for (id, probability) in [("a", 0.1), ("b", 0.2), ("c", 0.3)] {
            let record = store.get(id).unwrap();
            assert!(record.has_embedding(), "{id} has no embedding");
            assert_eq!(record.probability, probability);
        }
    }

    #[tokio::test]
    async fn test_existing_markets_are_refreshed_without_embedding() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (importer, store) = importer(embedder.clone());
        store
            .add(
                "a",
                MarketRecord::new("Old title", 0.5).with_embedding(vec![0.0, 1.0, 0.0]),
            )
            .unwrap();

        let report = importer
            .import(vec![
                market("a", "New title", Some(0.9)),
                market("b", "Brand new", Some(0.4)),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.refreshed, 1);

        let calls = embedder.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["Brand new".to_string()]);

        let a = store.get("a").unwrap();
        assert_eq!(a.title, "New title");
        assert_eq!(a.probability, 0.9);
        assert_eq!(a.embedding, Some(vec![0.0, 1.0, 0.0]));
    }

    #[tokio::test]
    async fn test_duplicates_and_missing_probability_are_skipped() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (importer, store) = importer(embedder.clone());

        let report = importer
            .import(vec![
                market("a", "First", Some(0.1)),
                market("a", "First again", Some(0.2)),
                market("m", "Multiple choice", None),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.get("a").unwrap().title, "First");
    }

    #[tokio::test]
    async fn test_nothing_new_means_no_embedding_call() {
        let embedder = Arc::new(CountingEmbedder::default());
        let (importer, _store) = importer(embedder.clone());

        let report = importer.import(Vec::new()).await.unwrap();

        assert_eq!(report, ImportReport::default());
        assert!(embedder.calls.lock().is_empty());
    }
}
