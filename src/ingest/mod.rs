//! Ingestion pipeline
//!
//! Full path from raw uploaded bytes to indexed passages: parse → extract
//! candidates → normalize and reconcile offsets → batch embed → persist.
//! Untrusted upstream fields are normalized exactly once here; downstream
//! code never sees a missing category or an unclamped confidence.

mod extract;
pub mod offsets;
mod parser;

pub use extract::{PassageExtractor, SegmentExtractor};
pub use parser::{DocumentParser, ParsedDocument, TextParser};

use crate::embedding::EmbeddingProvider;
use crate::error::{PassimError, Result};
use crate::models::{Document, DocumentSummary, Passage, PassageCategory, RawPassage};
use crate::store::IndexStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Confidence assigned when upstream omits or mangles the field
const DEFAULT_CONFIDENCE: f32 = 0.8;

/// Coordinates the collaborators of one ingestion run.
///
/// All dependencies are injected at construction; the pipeline holds no
/// global state and is safe to share.
pub struct IngestionPipeline {
    parser: Box<dyn DocumentParser>,
    extractor: Box<dyn PassageExtractor>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<IndexStore>,
}

impl IngestionPipeline {
    pub fn new(
        parser: Box<dyn DocumentParser>,
        extractor: Box<dyn PassageExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<IndexStore>,
    ) -> Self {
        Self {
            parser,
            extractor,
            embedder,
            store,
        }
    }

    /// Ingest one document end to end.
    ///
    /// A document from which zero passages survive still gets a valid
    /// record with `passage_count = 0`.
    pub async fn index_document(&self, raw_bytes: &[u8], filename: &str) -> Result<DocumentSummary> {
        let document_id = Uuid::new_v4().to_string();

        let parsed = self.parser.parse(raw_bytes, filename)?;
        let source_length = parsed.text.chars().count();
        info!(
            filename,
            pages = parsed.page_count,
            chars = source_length,
            "parsed document"
        );

        let candidates = self.extractor.extract(&parsed.text).await?;
        info!(candidates = candidates.len(), "extracted candidate passages");

        let drafts = post_process(&candidates, &parsed.text, &document_id);

        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts)?
        };
        if embeddings.len() != drafts.len() {
            return Err(PassimError::Embedding(format!(
                "batch produced {} embeddings for {} passages",
                embeddings.len(),
                drafts.len()
            )));
        }

        let passages: Vec<Passage> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| Passage { embedding, ..draft })
            .collect();

        let mut categories_found: Vec<PassageCategory> = Vec::new();
        for passage in &passages {
            if !categories_found.contains(&passage.category) {
                categories_found.push(passage.category);
            }
        }

        let document = Document {
            document_id: document_id.clone(),
            filename: filename.to_string(),
            ingested_at: Utc::now(),
            page_count: parsed.page_count.max(1),
            passage_count: passages.len() as u32,
            passage_types_found: categories_found.clone(),
            source_length,
        };
        self.store.put_document(&document)?;

        if !passages.is_empty() {
            let outcome = self.store.put_passages_bulk(&passages)?;
            if !outcome.failures.is_empty() {
                warn!(
                    attempted = outcome.attempted,
                    failed = outcome.failures.len(),
                    "passage indexing completed with per-item failures"
                );
            }
            info!(document_id = %document_id, indexed = outcome.indexed, "indexed passages");
        }

        Ok(DocumentSummary {
            document_id,
            filename: filename.to_string(),
            passage_count: passages.len() as u32,
            categories_found,
        })
    }
}

/// Normalize untrusted candidates and reconcile their spans.
///
/// Empty-text candidates are dropped; unknown categories become `Other`;
/// a missing offset hint defaults to 0; confidence is clamped to [0, 1].
/// Embeddings are left empty for the caller to fill from the batch encoder.
fn post_process(candidates: &[RawPassage], source: &str, document_id: &str) -> Vec<Passage> {
    let mut passages = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let text = candidate.text.trim();
        if text.is_empty() {
            debug!("dropping candidate passage with empty text");
            continue;
        }

        let hint = candidate.char_offset_start.unwrap_or(0);
        let (char_start, char_end) = offsets::resolve_span(source, text, hint);

        passages.push(Passage {
            passage_id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            category: PassageCategory::parse(&candidate.category),
            text: text.to_string(),
            section_label: candidate.section_label.trim().to_string(),
            page_number: candidate.page_number.unwrap_or(1).max(1),
            char_start,
            char_end,
            confidence: normalize_confidence(candidate.confidence),
            embedding: Vec::new(),
        });
    }
    passages
}

fn normalize_confidence(value: Option<f32>) -> f32 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
