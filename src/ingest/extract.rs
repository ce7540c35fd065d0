//! Passage extraction boundary
//!
//! The production extractor is an LLM call that proposes candidate passages
//! with categories and approximate offsets; that lives outside this crate.
//! This module defines the seam and a deterministic built-in extractor so
//! the pipeline runs end to end without a model: paragraph segmentation
//! plus regex keyword categorization.

use crate::error::{PassimError, Result};
use crate::models::{PassageCategory, RawPassage};
use async_trait::async_trait;
use regex::Regex;

/// Minimum block length (in characters) worth indexing as a passage
const MIN_PASSAGE_CHARS: usize = 40;

/// Proposes candidate passages from extracted document text.
///
/// Implementations may return approximate offsets, unknown category labels,
/// or missing fields; the ingestion post-processor normalizes all of it.
#[async_trait]
pub trait PassageExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<RawPassage>>;
}

/// Built-in extractor: splits text into blank-line-separated blocks and
/// tags each block with the first matching category keyword pattern.
pub struct SegmentExtractor {
    category_patterns: Vec<(PassageCategory, Regex)>,
    section_pattern: Regex,
}

impl SegmentExtractor {
    pub fn new() -> Result<Self> {
        let rules: [(PassageCategory, &str); 8] = [
            (PassageCategory::Indemnity, r"(?i)\b(indemnif\w*|hold harmless)"),
            (
                PassageCategory::LiabilityCap,
                r"(?i)\b(limitation of liability|aggregate liability|consequential damages)",
            ),
            (PassageCategory::Termination, r"(?i)\bterminat\w*"),
            (
                PassageCategory::Confidentiality,
                r"(?i)\b(confidential\w*|non-disclosure)",
            ),
            (
                PassageCategory::IpAssignment,
                r"(?i)\b(intellectual property|work product|ip rights)",
            ),
            (
                PassageCategory::GoverningLaw,
                r"(?i)\b(governing law|governed by the laws|exclusive jurisdiction)",
            ),
            (
                PassageCategory::DataProtection,
                r"(?i)\b(personal data|data protection|data processing)",
            ),
            (
                PassageCategory::ForceMajeure,
                r"(?i)\b(force majeure|act of god)",
            ),
        ];

        let mut category_patterns = Vec::with_capacity(rules.len());
        for (category, pattern) in rules {
            let regex = Regex::new(pattern)
                .map_err(|e| PassimError::Extraction(format!("bad category pattern: {e}")))?;
            category_patterns.push((category, regex));
        }

        let section_pattern =
            Regex::new(r"^\s*((?:Section|Article|Clause)\s+\d[\w.()]*|\d+(?:\.\d+)+|\d+\.)\s")
                .map_err(|e| PassimError::Extraction(format!("bad section pattern: {e}")))?;

        Ok(Self {
            category_patterns,
            section_pattern,
        })
    }

    fn classify(&self, block: &str) -> (PassageCategory, f32) {
        for (category, regex) in &self.category_patterns {
            if regex.is_match(block) {
                return (*category, 0.85);
            }
        }
        (PassageCategory::Other, 0.5)
    }

    fn section_label(&self, block: &str) -> String {
        let first_line = block.lines().next().unwrap_or("");
        self.section_pattern
            .captures(first_line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    }

    fn segment(&self, text: &str) -> Vec<RawPassage> {
        let mut passages = Vec::new();
        let mut block = String::new();
        let mut block_start: i64 = 0;
        let mut offset: i64 = 0;

        let flush = |block: &mut String, block_start: i64, out: &mut Vec<RawPassage>| {
            let candidate = block.trim_end_matches('\n');
            if candidate.chars().count() >= MIN_PASSAGE_CHARS {
                let (category, confidence) = self.classify(candidate);
                out.push(RawPassage {
                    category: category.as_str().to_string(),
                    text: candidate.to_string(),
                    section_label: self.section_label(candidate),
                    page_number: None,
                    char_offset_start: Some(block_start),
                    confidence: Some(confidence),
                });
            }
            block.clear();
        };

        for line in text.split_inclusive('\n') {
            if line.trim().is_empty() {
                flush(&mut block, block_start, &mut passages);
            } else {
                if block.is_empty() {
                    block_start = offset;
                }
                block.push_str(line);
            }
            offset += line.chars().count() as i64;
        }
        flush(&mut block, block_start, &mut passages);

        passages
    }
}

#[async_trait]
impl PassageExtractor for SegmentExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawPassage>> {
        Ok(self.segment(text))
    }
}
