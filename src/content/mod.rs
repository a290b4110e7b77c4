//! Document reading
//!
//! Turns a source document (PDF or plain text) into raw text and keeps an
//! ASCII text cache beside it, so the slow PDF conversion runs once per
//! source rather than once per run.

mod pdf;
mod text;

pub use pdf::PdfExtractor;
pub use text::TextExtractor;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Raw text of a document
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// The extracted text content
    pub content: String,
    /// Number of pages, when the format has pages
    pub page_count: Option<usize>,
}

impl ExtractedDocument {
    /// Create a new extracted document
    pub fn new(content: String) -> Self {
        Self {
            content,
            page_count: None,
        }
    }

    /// Set the page count
    pub fn with_page_count(mut self, pages: usize) -> Self {
        self.page_count = Some(pages);
        self
    }
}

/// Supported content types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Plain text (.txt, .md, etc.)
    Text,
    /// PDF document
    Pdf,
    /// Unknown/unsupported
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => ContentType::Pdf,
            Some("txt" | "md" | "text" | "lst") => ContentType::Text,
            _ => ContentType::Unknown,
        }
    }
}

/// Read a document from disk
pub fn read_document(path: &Path) -> Result<ExtractedDocument> {
    match ContentType::from_extension(path) {
        ContentType::Pdf => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            PdfExtractor::extract(&bytes)
                .with_context(|| format!("Failed to extract text from {}", path.display()))
        }
        ContentType::Text | ContentType::Unknown => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file as text: {}", path.display()))?;
            Ok(TextExtractor::extract(content))
        }
    }
}

/// Drop every non-ASCII character
pub fn ascii_only(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

/// Load a source's text, converting the document into the cache when needed.
///
/// Without a cache path the document is read directly. With one, the cache
/// is rebuilt when missing or when `force` is set, and read otherwise.
pub fn load_source_text(document: &Path, cache: Option<&Path>, force: bool) -> Result<String> {
    let Some(cache) = cache else {
        return Ok(read_document(document)?.content);
    };

    if !force && cache.exists() {
        return std::fs::read_to_string(cache)
            .with_context(|| format!("Failed to read text cache: {}", cache.display()));
    }

    info!("Converting {} into {}", document.display(), cache.display());
    let extracted = read_document(document)?;
    let text = ascii_only(&extracted.content);

    if let Some(parent) = cache.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(cache, &text)
        .with_context(|| format!("Failed to write text cache: {}", cache.display()))?;

    match extracted.page_count {
        Some(pages) => info!("Converted {} pages, {} lines", pages, text.lines().count()),
        None => info!("Converted {} lines", text.lines().count()),
    }

    Ok(text)
}
