//! Reciprocal Rank Fusion
//!
//! Lexical and vector scores live on incomparable scales (BM25 statistics
//! vs cosine similarity), so fusion discards raw scores entirely and
//! combines rank positions, which are scale-free.

use ahash::AHashMap;
use std::cmp::Ordering;
use std::hash::Hash;

/// RRF rank constant (Cormack, Clarke & Buettcher 2009).
pub const RRF_K: f32 = 60.0;

/// Fuse two ranked lists (rank 0 = best) into `(id, fused score)` pairs,
/// ordered best-first.
///
/// score(id) = Σ over each list containing id of `1 / (K + rank + 1)`.
/// An id appearing in only one list still accumulates that list's
/// contribution. Exact score ties are broken by first-seen position in
/// lexical-then-vector merge order, keeping the output deterministic.
pub fn reciprocal_rank_fusion<I>(lexical: &[I], vector: &[I]) -> Vec<(I, f32)>
where
    I: Clone + Eq + Hash,
{
    let mut scores: AHashMap<I, f32> = AHashMap::new();
    let mut first_seen: Vec<I> = Vec::new();

    for ranking in [lexical, vector] {
        for (rank, id) in ranking.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + rank as f32 + 1.0);
            if !scores.contains_key(id) {
                first_seen.push(id.clone());
            }
            *scores.entry(id.clone()).or_insert(0.0) += contribution;
        }
    }

    let mut fused: Vec<(I, f32)> = first_seen
        .into_iter()
        .map(|id| {
            let score = scores.get(&id).copied().unwrap_or(0.0);
            (id, score)
        })
        .collect();

    // Stable sort: equal scores keep first-seen order
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrf_concrete_example() {
        // lexical ranks [P1, P2, P3], vector ranks [P3, P1, P4]
        let lexical = vec!["P1", "P2", "P3"];
        let vector = vec!["P3", "P1", "P4"];

        let fused = reciprocal_rank_fusion(&lexical, &vector);
        let order: Vec<&str> = fused.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["P1", "P3", "P2", "P4"]);

        // P1 = 1/61 + 1/62, appears in both lists
        let p1 = fused[0].1;
        assert!((p1 - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-6);
        // P2 = 1/62 only
        let p2 = fused[2].1;
        assert!((p2 - 1.0 / 62.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_list_presence_still_scores() {
        let lexical: Vec<&str> = vec![];
        let vector = vec!["A", "B"];

        let fused = reciprocal_rank_fusion(&lexical, &vector);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].0, "A");
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_tie_broken_by_first_seen() {
        // Same rank in disjoint lists produces an exact tie; lexical wins
        // because it is merged first
        let lexical = vec!["L"];
        let vector = vec!["V"];

        let fused = reciprocal_rank_fusion(&lexical, &vector);
        assert_eq!(fused[0].0, "L");
        assert_eq!(fused[1].0, "V");
        assert_eq!(fused[0].1, fused[1].1);
    }

    #[test]
    fn test_empty_inputs() {
        let fused = reciprocal_rank_fusion::<&str>(&[], &[]);
        assert!(fused.is_empty());
    }
}
