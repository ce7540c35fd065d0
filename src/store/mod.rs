//! Passage index store
//!
//! Two logical collections (document metadata, passages) behind one facade:
//! a SQLite record store holds the canonical rows, a tantivy index serves
//! lexical queries, and an HNSW index serves vector queries. Both query
//! modes hydrate full passage records from SQLite and apply the same filter
//! semantics, so a passage excluded by a filter from one mode is excluded
//! from the other.

mod database;
mod keyword;
mod vector;

pub use database::{Database, DbPool};
pub use keyword::{KeywordHit, KeywordIndex};
pub use vector::VectorIndex;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::models::{Document, Passage, SearchFilters};
use ahash::AHashMap;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Over-fetch factor for vector queries when post-filtering applies
const VECTOR_FILTER_OVERFETCH: usize = 4;

/// One failed item from a bulk upsert.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub passage_id: String,
    pub reason: String,
}

/// Outcome of a bulk passage upsert. Partial success is expected and
/// surfaced, never swallowed: `attempted` counts every input item,
/// `failures` enumerates the ones that were not fully indexed.
#[derive(Debug, Clone)]
pub struct BulkIndexOutcome {
    pub attempted: usize,
    pub indexed: usize,
    pub failures: Vec<BulkFailure>,
}

/// One lexical query hit: the hydrated passage plus highlight fragments.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub passage: Passage,
    pub fragments: Vec<String>,
}

/// Facade over the document and passage collections.
///
/// Holds no per-request state; a single instance is safely shared across
/// arbitrarily many concurrent readers.
pub struct IndexStore {
    db: Database,
    keyword: RwLock<KeywordIndex>,
    vector: VectorIndex,
    dimension: usize,
    ef_search: usize,
}

impl IndexStore {
    /// Open the store under `data_dir` and ensure its schema exists.
    pub fn open(data_dir: &Path, config: &IndexConfig) -> Result<Self> {
        let db = Database::new(&data_dir.join("records.db"))?;
        let keyword = KeywordIndex::open_or_create(
            data_dir.join("keyword"),
            config.writer_heap_bytes,
        )?;
        let vector = VectorIndex::new(
            config.vector_dim,
            config.hnsw_m,
            config.hnsw_ef_construction,
            config.hnsw_capacity,
        );

        let store = Self {
            db,
            keyword: RwLock::new(keyword),
            vector,
            dimension: config.vector_dim,
            ef_search: config.hnsw_ef_search,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Idempotently create both collections. Safe to call on every process
    /// start; an existing collection's configuration is never touched.
    ///
    /// The lexical index was opened-or-created alongside the record store;
    /// the in-memory vector index is rebuilt from the durable embedding
    /// column only when empty, so repeated calls change nothing.
    pub fn ensure_schema(&self) -> Result<()> {
        self.db.migrate()?;

        if self.vector.is_empty() {
            let embeddings = self.db.all_embeddings()?;
            let total = embeddings.len();
            for (id, vector) in embeddings {
                if let Err(e) = self.vector.insert(id as u64, &vector) {
                    warn!(internal_id = id, error = %e, "skipping embedding during index rebuild");
                }
            }
            if total > 0 {
                debug!(total, "rebuilt vector index from record store");
            }
        }

        Ok(())
    }

    /// The embedding dimension every stored passage must match.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Upsert a document record in full (no partial merge).
    pub fn put_document(&self, document: &Document) -> Result<()> {
        self.db.upsert_document(document)
    }

    pub fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        self.db.get_document(document_id)
    }

    /// Documents ordered most-recently-ingested first.
    pub fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        self.db.list_documents(limit)
    }

    pub fn get_passages_by_document(&self, document_id: &str) -> Result<Vec<Passage>> {
        self.db.get_passages_by_document(document_id)
    }

    /// Single batched passage write.
    ///
    /// Individual item failures (validation or write errors) are logged and
    /// collected; they never abort the batch. The caller receives the
    /// attempted count, the fully-indexed count, and every failure with its
    /// reason.
    pub fn put_passages_bulk(&self, passages: &[Passage]) -> Result<BulkIndexOutcome> {
        let mut failures = Vec::new();
        let mut accepted: Vec<(u64, &Passage)> = Vec::new();

        for passage in passages {
            if let Err(reason) = self.validate_passage(passage) {
                warn!(passage_id = %passage.passage_id, %reason, "rejecting passage in bulk upsert");
                failures.push(BulkFailure {
                    passage_id: passage.passage_id.clone(),
                    reason,
                });
                continue;
            }
            match self.db.upsert_passage(passage) {
                Ok(internal_id) => accepted.push((internal_id as u64, passage)),
                Err(e) => {
                    warn!(passage_id = %passage.passage_id, error = %e, "record write failed in bulk upsert");
                    failures.push(BulkFailure {
                        passage_id: passage.passage_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !accepted.is_empty() {
            let mut keyword = self.keyword.write().unwrap();
            for (id, passage) in &accepted {
                keyword.upsert(*id, passage)?;
            }
            keyword.commit()?;
        }

        let mut indexed = 0;
        for (id, passage) in &accepted {
            match self.vector.insert(*id, &passage.embedding) {
                Ok(()) => indexed += 1,
                Err(e) => {
                    warn!(passage_id = %passage.passage_id, error = %e, "vector insert failed in bulk upsert");
                    failures.push(BulkFailure {
                        passage_id: passage.passage_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(BulkIndexOutcome {
            attempted: passages.len(),
            indexed,
            failures,
        })
    }

    fn validate_passage(&self, passage: &Passage) -> std::result::Result<(), String> {
        if passage.text.trim().is_empty() {
            return Err("empty passage text".to_string());
        }
        if passage.embedding.len() != self.dimension {
            return Err(format!(
                "embedding dimension {} does not match index dimension {}",
                passage.embedding.len(),
                self.dimension
            ));
        }
        if passage.char_start > passage.char_end {
            return Err(format!(
                "invalid span: char_start {} > char_end {}",
                passage.char_start, passage.char_end
            ));
        }
        Ok(())
    }

    /// Term-frequency ranked query, best-first, with highlight fragments.
    pub fn lexical_query(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        let hits = self
            .keyword
            .read()
            .unwrap()
            .search(query_text, filters, limit)?;

        let ids: Vec<i64> = hits.iter().map(|h| h.id as i64).collect();
        let records = self.hydrate(&ids)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match records.get(&(hit.id as i64)) {
                Some(passage) => results.push(LexicalHit {
                    passage: passage.clone(),
                    fragments: hit.fragments,
                }),
                None => warn!(internal_id = hit.id, "lexical hit missing from record store, skipping"),
            }
        }
        Ok(results)
    }

    /// Nearest-neighbor ranked query over passage embeddings.
    ///
    /// HNSW cannot filter natively, so a filtered query over-fetches and
    /// post-filters with the same predicate the lexical path encodes,
    /// keeping the two modes filter-consistent.
    pub fn vector_query(
        &self,
        query_vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<Passage>> {
        let fetch = if filters.is_unrestricted() {
            limit
        } else {
            limit.saturating_mul(VECTOR_FILTER_OVERFETCH)
        };

        let neighbors = self
            .vector
            .search(query_vector, fetch, self.ef_search.max(fetch))?;

        let ids: Vec<i64> = neighbors.iter().map(|(id, _)| *id as i64).collect();
        let records = self.hydrate(&ids)?;

        let mut results = Vec::with_capacity(limit);
        let mut seen = ahash::AHashSet::new();
        for (id, _similarity) in neighbors {
            if results.len() >= limit {
                break;
            }
            if !seen.insert(id) {
                continue;
            }
            let Some(passage) = records.get(&(id as i64)) else {
                warn!(internal_id = id, "vector hit missing from record store, skipping");
                continue;
            };
            if filters.matches(passage) {
                results.push(passage.clone());
            }
        }
        Ok(results)
    }

    fn hydrate(&self, ids: &[i64]) -> Result<AHashMap<i64, Passage>> {
        let rows = self.db.get_passages_by_internal_ids(ids)?;
        Ok(rows.into_iter().collect())
    }
}
