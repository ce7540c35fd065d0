//! Core data model: documents, passages, and retrieval hits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed set of passage categories.
///
/// Unrecognized labels from upstream extractors map to [`PassageCategory::Other`],
/// never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageCategory {
    Indemnity,
    LiabilityCap,
    Termination,
    Confidentiality,
    IpAssignment,
    GoverningLaw,
    DataProtection,
    ForceMajeure,
    Other,
}

impl PassageCategory {
    pub const ALL: [PassageCategory; 9] = [
        PassageCategory::Indemnity,
        PassageCategory::LiabilityCap,
        PassageCategory::Termination,
        PassageCategory::Confidentiality,
        PassageCategory::IpAssignment,
        PassageCategory::GoverningLaw,
        PassageCategory::DataProtection,
        PassageCategory::ForceMajeure,
        PassageCategory::Other,
    ];

    /// Parse a category label, falling back to `Other` for anything unknown.
    pub fn parse(label: &str) -> Self {
        match label {
            "indemnity" => PassageCategory::Indemnity,
            "liability_cap" => PassageCategory::LiabilityCap,
            "termination" => PassageCategory::Termination,
            "confidentiality" => PassageCategory::Confidentiality,
            "ip_assignment" => PassageCategory::IpAssignment,
            "governing_law" => PassageCategory::GoverningLaw,
            "data_protection" => PassageCategory::DataProtection,
            "force_majeure" => PassageCategory::ForceMajeure,
            _ => PassageCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PassageCategory::Indemnity => "indemnity",
            PassageCategory::LiabilityCap => "liability_cap",
            PassageCategory::Termination => "termination",
            PassageCategory::Confidentiality => "confidentiality",
            PassageCategory::IpAssignment => "ip_assignment",
            PassageCategory::GoverningLaw => "governing_law",
            PassageCategory::DataProtection => "data_protection",
            PassageCategory::ForceMajeure => "force_majeure",
            PassageCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for PassageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata record for one ingested document.
///
/// `passage_count` and `passage_types_found` are set exactly once, when
/// ingestion completes. Documents are never deleted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub filename: String,
    pub ingested_at: DateTime<Utc>,
    pub page_count: u32,
    pub passage_count: u32,
    pub passage_types_found: Vec<PassageCategory>,
    /// Character count of the extracted source text
    pub source_length: usize,
}

/// One indexed passage: verbatim text plus its dense embedding.
///
/// `char_start`/`char_end` is a half-open character span into the parent
/// document's extracted text. When offset resolution succeeded, slicing the
/// source at this span reproduces `text`; a span produced by the hint
/// fallback is unverified and may lie outside document bounds (including
/// negative starts), which is why the fields are signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub passage_id: String,
    /// Back-reference to the parent document (not an ownership edge)
    pub document_id: String,
    pub category: PassageCategory,
    pub text: String,
    #[serde(default)]
    pub section_label: String,
    pub page_number: u32,
    pub char_start: i64,
    pub char_end: i64,
    /// Extraction confidence, clamped to [0, 1]
    pub confidence: f32,
    /// Dense vector; length must equal the configured embedding dimension.
    /// Excluded from serialized output (hits never ship their vectors).
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
}

/// Untrusted candidate passage from an upstream extractor.
///
/// Any field may be absent or malformed; normalization happens exactly once
/// at the ingestion boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPassage {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub section_label: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub char_offset_start: Option<i64>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// A fused retrieval result. Created fresh per query, never persisted.
///
/// `fusion_score` has no fixed upper bound and is not comparable across
/// queries.
#[derive(Debug, Clone, Serialize)]
pub struct RankedHit {
    pub passage: Passage,
    pub fusion_score: f32,
    /// Highlighted fragments from the lexical query (vector search has none)
    pub highlights: Vec<String>,
}

/// Summary returned by the ingestion entry point.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub document_id: String,
    pub filename: String,
    pub passage_count: u32,
    pub categories_found: Vec<PassageCategory>,
}

/// Conjunctive retrieval filters shared by the lexical and vector query
/// paths. Empty lists mean no restriction.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub categories: Vec<PassageCategory>,
    pub document_ids: Vec<String>,
}

impl SearchFilters {
    pub fn is_unrestricted(&self) -> bool {
        self.categories.is_empty() && self.document_ids.is_empty()
    }

    /// The single source of filter truth: a passage excluded here must be
    /// excluded from both query modes.
    pub fn matches(&self, passage: &Passage) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&passage.category) {
            return false;
        }
        if !self.document_ids.is_empty() && !self.document_ids.contains(&passage.document_id) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_known() {
        assert_eq!(
            PassageCategory::parse("liability_cap"),
            PassageCategory::LiabilityCap
        );
        assert_eq!(
            PassageCategory::parse("governing_law"),
            PassageCategory::GoverningLaw
        );
    }

    #[test]
    fn test_category_parse_unknown_falls_back_to_other() {
        assert_eq!(PassageCategory::parse("warranty"), PassageCategory::Other);
        assert_eq!(PassageCategory::parse(""), PassageCategory::Other);
    }

    #[test]
    fn test_category_roundtrip() {
        for category in PassageCategory::ALL {
            assert_eq!(PassageCategory::parse(category.as_str()), category);
        }
    }

    #[test]
    fn test_filters_empty_matches_everything() {
        let filters = SearchFilters::default();
        let passage = sample_passage(PassageCategory::Termination, "doc-1");
        assert!(filters.is_unrestricted());
        assert!(filters.matches(&passage));
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let filters = SearchFilters {
            categories: vec![PassageCategory::Termination],
            document_ids: vec!["doc-1".to_string()],
        };
        assert!(filters.matches(&sample_passage(PassageCategory::Termination, "doc-1")));
        assert!(!filters.matches(&sample_passage(PassageCategory::Termination, "doc-2")));
        assert!(!filters.matches(&sample_passage(PassageCategory::Indemnity, "doc-1")));
    }

    fn sample_passage(category: PassageCategory, document_id: &str) -> Passage {
        Passage {
            passage_id: "p-1".to_string(),
            document_id: document_id.to_string(),
            category,
            text: "Either party may terminate this Agreement.".to_string(),
            section_label: String::new(),
            page_number: 1,
            char_start: 0,
            char_end: 42,
            confidence: 0.9,
            embedding: vec![0.0; 4],
        }
    }
}
