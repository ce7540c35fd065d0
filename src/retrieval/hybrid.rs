//! Hybrid retrieval
//!
//! Issues one lexical and one vector query concurrently against the store,
//! fuses the two rankings with RRF, and returns a single deduplicated,
//! ranked hit list. Either sub-query failing fails the whole search:
//! partial fusion would silently bias rankings toward the surviving mode.

use crate::error::{PassimError, Result};
use crate::models::{Passage, RankedHit, SearchFilters};
use crate::retrieval::fusion::reciprocal_rank_fusion;
use crate::store::{IndexStore, LexicalHit};
use ahash::AHashMap;
use std::sync::Arc;
use tokio::task;
use tracing::debug;

/// Upper bound on `top_k`
pub const MAX_TOP_K: usize = 100;

/// Each sub-query fetches `top_k * 5` candidates so both rankings have
/// enough depth for fusion to agree or disagree meaningfully
const OVERFETCH_FACTOR: usize = 5;

/// Hybrid searcher over a shared read-only [`IndexStore`].
pub struct HybridRetriever {
    store: Arc<IndexStore>,
}

impl HybridRetriever {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Execute a hybrid search.
    ///
    /// Validation happens before any I/O: `top_k` must lie in `[1, 100]`,
    /// the query text must be non-empty, and the query vector must match
    /// the store's embedding dimension.
    pub async fn search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<RankedHit>> {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(PassimError::Validation(format!(
                "top_k must be within [1, {MAX_TOP_K}], got {top_k}"
            )));
        }
        if query_text.trim().is_empty() {
            return Err(PassimError::Validation(
                "query text must not be empty".to_string(),
            ));
        }
        if query_vector.len() != self.store.dimension() {
            return Err(PassimError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query_vector.len(),
            });
        }

        let fetch = top_k * OVERFETCH_FACTOR;

        let lexical_task = {
            let store = Arc::clone(&self.store);
            let text = query_text.to_string();
            let filters = filters.clone();
            task::spawn_blocking(move || store.lexical_query(&text, &filters, fetch))
        };
        let vector_task = {
            let store = Arc::clone(&self.store);
            let vector = query_vector.to_vec();
            let filters = filters.clone();
            task::spawn_blocking(move || store.vector_query(&vector, &filters, fetch))
        };

        // Both-or-fail: a join error or a store error on either side is a
        // hard failure of the whole search
        let (lexical, vector) = tokio::try_join!(lexical_task, vector_task)?;
        let (lexical, vector) = (lexical?, vector?);

        debug!(
            lexical_hits = lexical.len(),
            vector_hits = vector.len(),
            "fusing sub-query rankings"
        );

        Ok(fuse(lexical, vector, top_k))
    }
}

/// Fuse the two hydrated rankings into the final hit list.
///
/// Passage metadata comes from whichever list populated it first (lexical,
/// then vector); highlight fragments come from the lexical list only.
fn fuse(lexical: Vec<LexicalHit>, vector: Vec<Passage>, top_k: usize) -> Vec<RankedHit> {
    let lexical_ids: Vec<String> = lexical
        .iter()
        .map(|hit| hit.passage.passage_id.clone())
        .collect();
    let vector_ids: Vec<String> = vector.iter().map(|p| p.passage_id.clone()).collect();

    let mut passages: AHashMap<String, Passage> = AHashMap::new();
    let mut highlights: AHashMap<String, Vec<String>> = AHashMap::new();
    for hit in lexical {
        let id = hit.passage.passage_id.clone();
        highlights.insert(id.clone(), hit.fragments);
        passages.entry(id).or_insert(hit.passage);
    }
    for passage in vector {
        passages.entry(passage.passage_id.clone()).or_insert(passage);
    }

    let fused = reciprocal_rank_fusion(&lexical_ids, &vector_ids);

    let mut hits = Vec::with_capacity(top_k.min(fused.len()));
    for (id, score) in fused {
        if hits.len() >= top_k {
            break;
        }
        let Some(passage) = passages.remove(&id) else {
            continue;
        };
        hits.push(RankedHit {
            passage,
            fusion_score: score,
            highlights: highlights.remove(&id).unwrap_or_default(),
        });
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PassageCategory;

    fn passage(id: &str) -> Passage {
        Passage {
            passage_id: id.to_string(),
            document_id: "doc-1".to_string(),
            category: PassageCategory::Other,
            text: format!("text of {id}"),
            section_label: String::new(),
            page_number: 1,
            char_start: 0,
            char_end: 10,
            confidence: 0.5,
            embedding: vec![0.0; 4],
        }
    }

    #[test]
    fn test_fuse_highlights_come_from_lexical_only() {
        let lexical = vec![LexicalHit {
            passage: passage("P1"),
            fragments: vec!["<b>term</b> fragment".to_string()],
        }];
        let vector = vec![passage("P1"), passage("P2")];

        let hits = fuse(lexical, vector, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].passage.passage_id, "P1");
        assert_eq!(hits[0].highlights.len(), 1);
        assert!(hits[1].highlights.is_empty());
    }

    #[test]
    fn test_fuse_truncates_to_top_k() {
        let lexical: Vec<LexicalHit> = (0..8)
            .map(|i| LexicalHit {
                passage: passage(&format!("L{i}")),
                fragments: vec![],
            })
            .collect();
        let hits = fuse(lexical, vec![], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].passage.passage_id, "L0");
    }

    #[test]
    fn test_fuse_scores_descend() {
        let lexical = vec![
            LexicalHit { passage: passage("A"), fragments: vec![] },
            LexicalHit { passage: passage("B"), fragments: vec![] },
        ];
        let vector = vec![passage("B"), passage("C")];

        let hits = fuse(lexical, vector, 10);
        for pair in hits.windows(2) {
            assert!(pair[0].fusion_score >= pair[1].fusion_score);
        }
        // B appears in both lists and must outrank single-list entries
        assert_eq!(hits[0].passage.passage_id, "B");
    }

    #[test]
    fn test_fuse_empty_inputs_yield_empty_result() {
        let hits = fuse(vec![], vec![], 5);
        assert!(hits.is_empty());
    }
}
