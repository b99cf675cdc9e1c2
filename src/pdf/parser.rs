//! Direct text extraction from the PDF structure (no OCR).

use std::fmt::Display;

use lopdf::Document;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from parsing a PDF.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid PDF: {0}")]
    Invalid(String),
}

/// Text pulled straight out of the PDF content streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    /// Embedded text, possibly empty for image-only scans.
    pub text: String,
    /// Number of pages, at least 1.
    pub page_count: u32,
}

/// Parses embedded text and page count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectTextParser;

impl DirectTextParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a PDF from memory.
    ///
    /// A document whose pages cannot all be decoded together is retried page
    /// by page, skipping pages whose text cannot be decoded.
    pub fn parse(&self, pdf: &[u8]) -> Result<ParsedText, ParseError> {
        let doc = Document::load_mem(pdf).map_err(|e| ParseError::Invalid(e.to_string()))?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let text = if page_numbers.is_empty() {
            String::new()
        } else {
            match doc.extract_text(&page_numbers) {
                Ok(text) => text,
                Err(e) => {
                    debug!(
                        "Whole-document text extraction failed ({}), going page by page",
                        e
                    );
                    join_pages(&page_numbers, |page| doc.extract_text(&[page]))
                }
            }
        };

        let page_count = u32::try_from(page_numbers.len()).unwrap_or(u32::MAX).max(1);
        debug!(
            "Parsed {} pages, {} chars of embedded text",
            page_count,
            text.chars().count()
        );

        Ok(ParsedText { text, page_count })
    }

    /// Count pages without extracting text.
    pub fn page_count(&self, pdf: &[u8]) -> Result<u32, ParseError> {
        let doc = Document::load_mem(pdf).map_err(|e| ParseError::Invalid(e.to_string()))?;
        Ok(u32::try_from(doc.get_pages().len()).unwrap_or(u32::MAX))
    }
}

/// Concatenate per-page text, skipping (and logging) pages that fail.
fn join_pages<E: Display>(
    page_numbers: &[u32],
    extract: impl Fn(u32) -> Result<String, E>,
) -> String {
    let mut out = String::new();
    for &page_number in page_numbers {
        match extract(page_number) {
            Ok(page_text) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&page_text);
            }
            Err(e) => warn!("Skipping text of page {}: {}", page_number, e),
        }
    }
    out
}
