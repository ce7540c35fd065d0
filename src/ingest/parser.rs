//! Document parsing boundary
//!
//! Format parsing is an external collaborator concern; this module defines
//! the seam and ships a plain-text implementation. A PDF-capable parser can
//! be plugged in without touching the pipeline.

use crate::error::{PassimError, Result};

/// Extracted document content: full text plus page count.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    /// Always at least 1
    pub page_count: u32,
}

/// Turns raw uploaded bytes into extracted text.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument>;
}

/// Plain-text parser: lossy UTF-8 decode, single page.
#[derive(Debug, Default)]
pub struct TextParser;

impl DocumentParser for TextParser {
    fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
        if filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(PassimError::Parse(format!(
                "{filename}: PDF input requires an external document parser"
            )));
        }
        let text = String::from_utf8_lossy(bytes).into_owned();
        Ok(ParsedDocument {
            text,
            page_count: 1,
        })
    }
}
