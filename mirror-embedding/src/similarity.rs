//! Cosine similarity calculations

use std::cmp::Ordering;

use ndarray::ArrayView1;
use tracing::debug;

use crate::types::SimilarityMatch;

/// Calculate cosine similarity between two embeddings
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical). Vectors of
/// different lengths or with zero magnitude score 0.0.
///
/// Formula: cos(θ) = (A · B) / (||A|| ||B||)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let a_view = ArrayView1::from(a);
    let b_view = ArrayView1::from(b);

    let dot_product = a_view.dot(&b_view);
    let norm_a = a_view.dot(&a_view).sqrt();
    let norm_b = b_view.dot(&b_view).sqrt();

    // Avoid division by zero
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)) as f64
}

/// Scale a vector to unit length (zero vectors are returned unchanged)
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let view = ArrayView1::from(v);
    let norm = view.dot(&view).sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    view.mapv(|x| x / norm).to_vec()
}

/// Order matches closest-first; the sort is stable so equal scores keep
/// their candidate order
pub fn sort_closest_first(matches: &mut [SimilarityMatch]) {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Exact top-K search over `(market_id, embedding)` candidates
///
/// Candidates must be supplied in insertion order; ties keep that order.
pub fn find_nearest<'a, I>(query: &[f32], candidates: I, top_k: usize) -> Vec<SimilarityMatch>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    if top_k == 0 {
        return Vec::new();
    }

    let mut matches: Vec<SimilarityMatch> = candidates
        .into_iter()
        .map(|(market_id, embedding)| SimilarityMatch {
            market_id: market_id.to_string(),
            score: cosine_similarity(query, embedding),
        })
        .collect();

    debug!("Exact scan over {} candidates, top_k={}", matches.len(), top_k);

    sort_closest_first(&mut matches);
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-6, "Identical vectors should have similarity ~1.0");
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6, "Orthogonal vectors should have similarity ~0.0");
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        let sim = cosine_similarity(&a, &b);
        assert!((sim + 1.0).abs() < 1e-6, "Opposite vectors should have similarity ~-1.0");
    }

    #[test]
    fn test_normalize() {
        let n = normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_find_nearest() {
        let market_embs: Vec<(String, Vec<f32>)> = vec![
            ("market1".to_string(), vec![0.0, 1.0, 0.0]), // Orthogonal
            ("market2".to_string(), vec![0.8, 0.6, 0.0]), // High similarity
            ("market3".to_string(), vec![1.0, 0.0, 0.0]), // Perfect match
        ];

        let matches = find_nearest(
            &[1.0, 0.0, 0.0],
            market_embs.iter().map(|(id, e)| (id.as_str(), e.as_slice())),
            2,
        );

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].market_id, "market3", "market3 should be top match");
        assert_eq!(matches[1].market_id, "market2");
    }

    #[test]
    fn test_find_nearest_ties_keep_candidate_order() {
        let market_embs: Vec<(String, Vec<f32>)> = vec![
            ("b".to_string(), vec![1.0, 0.0]),
            ("a".to_string(), vec![2.0, 0.0]),
            ("c".to_string(), vec![3.0, 0.0]),
        ];

        let matches = find_nearest(
            &[1.0, 0.0],
            market_embs.iter().map(|(id, e)| (id.as_str(), e.as_slice())),
            3,
        );

        let ids: Vec<&str> = matches.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
