//! PDF text extraction
//!
//! Extracts text content from PDF documents using pdf-extract.

use super::ExtractedDocument;
use anyhow::{Context, Result};

/// PDF content extractor
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract text content from PDF bytes.
    ///
    /// Line structure is preserved as produced by the extractor, because
    /// sources locate their index by line number.
    pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .context("Failed to extract text from PDF")?;

        // pdf-extract separates pages with form feeds
        let pages = text.matches('\x0c').count() + 1;
        let cleaned = Self::clean_text(&text.replace('\x0c', "\n"));

        if cleaned.trim().is_empty() {
            anyhow::bail!("PDF contains no extractable text (may be image-only)");
        }

        Ok(ExtractedDocument::new(cleaned).with_page_count(pages))
    }

    /// Trim trailing whitespace per line without dropping any lines
    fn clean_text(text: &str) -> String {
        text.lines()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
