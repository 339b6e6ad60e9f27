//! Approximate nearest-neighbor index (IVF, list-partitioned)
//!
//! Vectors are normalized and partitioned into `lists` clusters by k-means
//! on a training sample. A query scores only the members of the `probes`
//! clusters whose centroids are closest, trading exactness for speed.
//!
//! Vectors added after the build join the list of their closest centroid
//! without retraining; the owner decides when the drift warrants a rebuild.

use std::cmp::Ordering;
use std::collections::HashSet;

use ndarray::ArrayView1;
use tracing::{debug, info};

use crate::similarity::normalize;
use crate::types::SimilarityMatch;

/// Training points sampled per list (pgvector uses the same ratio)
const SAMPLES_PER_LIST: usize = 50;

/// IVF build and query parameters
#[derive(Debug, Clone, Copy)]
pub struct IvfParams {
    /// Number of clusters
    pub lists: usize,
    /// Clusters scanned per query
    pub probes: usize,
    /// k-means refinement rounds
    pub iterations: usize,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            lists: 100,
            probes: 10,
            iterations: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    /// Position in store insertion order, used to break score ties
    seq: usize,
    market_id: String,
    unit: Vec<f32>,
}

/// Inverted-file index over unit vectors
#[derive(Debug, Clone)]
pub struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<Member>>,
    ids: HashSet<String>,
    probes: usize,
    /// Vectors present when the centroids were trained
    trained: usize,
    next_seq: usize,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    ArrayView1::from(a).dot(&ArrayView1::from(b))
}

fn closest_centroid(centroids: &[Vec<f32>], unit: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let score = dot(c, unit);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    best
}

impl IvfIndex {
    /// Build an index from `(market_id, embedding)` pairs in insertion order
    ///
    /// Returns `None` when there is nothing to index.
    pub fn build(entries: Vec<(String, Vec<f32>)>, params: IvfParams) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }

        let members: Vec<Member> = entries
            .into_iter()
            .enumerate()
            .map(|(seq, (market_id, embedding))| Member {
                seq,
                market_id,
                unit: normalize(&embedding),
            })
            .collect();

        let k = params.lists.clamp(1, members.len());
        let sample_size = (k * SAMPLES_PER_LIST).min(members.len());
        let step = members.len() / sample_size;
        let sample: Vec<&[f32]> = members
            .iter()
            .step_by(step.max(1))
            .take(sample_size)
            .map(|m| m.unit.as_slice())
            .collect();

        // Deterministic seeding: evenly spaced sample points
        let mut centroids: Vec<Vec<f32>> = (0..k)
            .map(|i| sample[i * sample.len() / k].to_vec())
            .collect();

        for _ in 0..params.iterations {
            let dimension = centroids[0].len();
            let mut sums = vec![vec![0.0f32; dimension]; k];
            let mut counts = vec![0usize; k];

            for point in &sample {
                let c = closest_centroid(&centroids, point);
                counts[c] += 1;
                for (s, x) in sums[c].iter_mut().zip(point.iter()) {
                    *s += x;
                }
            }

            for (i, sum) in sums.into_iter().enumerate() {
                // Empty clusters keep their previous centroid
                if counts[i] > 0 {
                    centroids[i] = normalize(&sum);
                }
            }
        }

        let mut lists: Vec<Vec<Member>> = vec![Vec::new(); k];
        let len = members.len();
        let ids = members.iter().map(|m| m.market_id.clone()).collect();
        for member in members {
            let c = closest_centroid(&centroids, &member.unit);
            lists[c].push(member);
        }

        info!(
            "[Index] Built IVF index: {} vectors, {} lists, {} probes",
            len, k, params.probes
        );

        Some(Self {
            centroids,
            lists,
            ids,
            probes: params.probes.max(1),
            trained: len,
            next_seq: len,
        })
    }

    /// Add a vector to the list of its closest centroid
    ///
    /// Returns `false` when the id is already indexed or the dimension does
    /// not match the trained centroids.
    pub fn insert(&mut self, market_id: &str, embedding: &[f32]) -> bool {
        if self.ids.contains(market_id)
            || self.centroids.first().is_some_and(|c| c.len() != embedding.len())
        {
            return false;
        }

        let unit = normalize(embedding);
        let list = closest_centroid(&self.centroids, &unit);
        self.lists[list].push(Member {
            seq: self.next_seq,
            market_id: market_id.to_string(),
            unit,
        });
        self.ids.insert(market_id.to_string());
        self.next_seq += 1;
        true
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vectors present when the centroids were trained
    pub fn trained(&self) -> usize {
        self.trained
    }

    /// Vectors inserted since the centroids were trained
    pub fn appended(&self) -> usize {
        self.len() - self.trained
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Approximate top-K by cosine similarity, closest first
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SimilarityMatch> {
        if top_k == 0 {
            return Vec::new();
        }

        let unit = normalize(query);
        if self.centroids.first().is_some_and(|c| c.len() != unit.len()) {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, dot(c, &unit)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut scored: Vec<(usize, SimilarityMatch)> = ranked
            .iter()
            .take(self.probes)
            .flat_map(|(list, _)| self.lists[*list].iter())
            .map(|m| {
                (
                    m.seq,
                    SimilarityMatch {
                        market_id: m.market_id.clone(),
                        score: dot(&m.unit, &unit) as f64,
                    },
                )
            })
            .collect();

        debug!(
            "[Index] Probed {} lists, scored {} candidates",
            self.probes.min(self.lists.len()),
            scored.len()
        );

        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(seq_a.cmp(seq_b))
        });
        scored.truncate(top_k);
        scored.into_iter().map(|(_, m)| m).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dim: usize, i: usize, scale: f32) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[i] = scale;
        v
    }

    #[test]
    fn test_build_empty_is_none() {
        assert!(IvfIndex::build(Vec::new(), IvfParams::default()).is_none());
    }

    #[test]
    fn test_lists_capped_by_entries() {
        let entries = vec![("a".to_string(), vec![1.0, 0.0]), ("b".to_string(), vec![0.0, 1.0])];
        let index = IvfIndex::build(entries, IvfParams::default()).unwrap();
        assert_eq!(index.list_count(), 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_search_finds_exact_vector() {
        let dim = 8;
        let entries: Vec<(String, Vec<f32>)> = (0..64)
            .map(|i| (format!("m{}", i), axis(dim, i % dim, 1.0 + i as f32)))
            .collect();
        let target = entries[13].1.clone();

        let index = IvfIndex::build(
            entries,
            IvfParams {
                lists: 4,
                probes: 1,
                iterations: 3,
            },
        )
        .unwrap();

        let results = index.search(&target, 1);
        assert_eq!(results.len(), 1);
        // Every vector on the same axis scores 1.0; the earliest inserted wins
        assert_eq!(results[0].market_id, "m5");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_limit() {
        let entries: Vec<(String, Vec<f32>)> = (0..20)
            .map(|i| (format!("m{}", i), vec![1.0, i as f32 / 10.0]))
            .collect();
        let index = IvfIndex::build(entries, IvfParams::default()).unwrap();
        assert!(index.search(&[1.0, 0.0], 5).len() <= 5);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_insert_after_build_is_searchable() {
        let entries = vec![
            ("a".to_string(), vec![1.0, 0.0, 0.0]),
            ("b".to_string(), vec![0.0, 1.0, 0.0]),
        ];
        let mut index = IvfIndex::build(
            entries,
            IvfParams {
                lists: 2,
                probes: 2,
                iterations: 2,
            },
        )
        .unwrap();

        assert!(index.insert("c", &[0.0, 0.2, 1.0]));
        assert_eq!(index.len(), 3);
        assert_eq!(index.appended(), 1);
        assert_eq!(index.search(&[0.0, 0.0, 1.0], 1)[0].market_id, "c");

        // Duplicates and wrong dimensions are ignored
        assert!(!index.insert("c", &[1.0, 1.0, 1.0]));
        assert!(!index.insert("d", &[1.0, 1.0]));
        assert_eq!(index.len(), 3);
    }
}
