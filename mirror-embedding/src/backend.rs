//! Persistence backends for the market store

use indexmap::IndexMap;
use mirror_core::MarketRecord;
use parking_lot::RwLock;

use crate::{
    error::{EmbeddingError, Result},
    similarity::find_nearest,
    types::SimilarityMatch,
};

/// Keyed record storage with a nearest-vector query
///
/// Every operation is atomic on its own. Backends report iteration in
/// insertion order so that equal-distance results stay reproducible.
pub trait StoreBackend: Send + Sync {
    /// Insert a new record; `AlreadyExists` if the id is taken
    fn insert(&self, id: &str, record: &MarketRecord) -> Result<()>;

    /// Fetch a record; `NotFound` if absent
    fn select(&self, id: &str) -> Result<MarketRecord>;

    /// Replace a record; `NotFound` if absent
    fn update(&self, id: &str, record: &MarketRecord) -> Result<()>;

    /// Remove a record; `NotFound` if absent
    fn delete(&self, id: &str) -> Result<()>;

    fn contains(&self, id: &str) -> Result<bool>;

    fn len(&self) -> Result<usize>;

    /// All `(id, embedding)` pairs that have an embedding, in insertion order
    fn embeddings(&self) -> Result<Vec<(String, Vec<f32>)>>;

    /// Exact top-K by cosine similarity, closest first
    fn nearest_by_vector(&self, query: &[f32], limit: usize) -> Result<Vec<SimilarityMatch>> {
        let embeddings = self.embeddings()?;
        Ok(find_nearest(
            query,
            embeddings.iter().map(|(id, e)| (id.as_str(), e.as_slice())),
            limit,
        ))
    }
}

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<IndexMap<String, MarketRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn insert(&self, id: &str, record: &MarketRecord) -> Result<()> {
        let mut records = self.records.write();
        if records.contains_key(id) {
            return Err(EmbeddingError::AlreadyExists(id.to_string()));
        }
        records.insert(id.to_string(), record.clone());
        Ok(())
    }

    fn select(&self, id: &str) -> Result<MarketRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EmbeddingError::NotFound(id.to_string()))
    }

    fn update(&self, id: &str, record: &MarketRecord) -> Result<()> {
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(EmbeddingError::NotFound(id.to_string())),
        }
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| EmbeddingError::NotFound(id.to_string()))
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.records.read().contains_key(id))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }

    fn embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter_map(|(id, r)| r.embedding.as_ref().map(|e| (id.clone(), e.clone())))
            .collect())
    }

    fn nearest_by_vector(&self, query: &[f32], limit: usize) -> Result<Vec<SimilarityMatch>> {
        let records = self.records.read();
        Ok(find_nearest(
            query,
            records
                .iter()
                .filter_map(|(id, r)| r.embedding.as_deref().map(|e| (id.as_str(), e))),
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_keeps_insertion_order() {
        let backend = MemoryBackend::new();
        for id in ["a", "b", "c"] {
            backend
                .insert(id, &MarketRecord::new(id, 0.5).with_embedding(vec![1.0, 0.0]))
                .unwrap();
        }
        backend.delete("a").unwrap();

        let ids: Vec<String> = backend.embeddings().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_records_without_embedding_are_not_candidates() {
        let backend = MemoryBackend::new();
        backend.insert("a", &MarketRecord::new("A", 0.5)).unwrap();
        backend
            .insert("b", &MarketRecord::new("B", 0.5).with_embedding(vec![0.0, 1.0]))
            .unwrap();

        let matches = backend.nearest_by_vector(&[1.0, 0.0], 10).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].market_id, "b");
    }
}
