//! Plain text extraction
//!
//! Simple wrapper for plain text content such as word lists.

use super::ExtractedDocument;

/// Plain text extractor
pub struct TextExtractor;

impl TextExtractor {
    /// Create an ExtractedDocument from plain text content
    pub fn extract(content: String) -> ExtractedDocument {
        // normalize a leading BOM away so the first line tokenizes cleanly
        let content = match content.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => content,
        };
        ExtractedDocument::new(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_content() {
        let doc = TextExtractor::extract("abscess\nbiopsy".to_string());
        assert_eq!(doc.content, "abscess\nbiopsy");
        assert_eq!(doc.content.lines().count(), 2);
        assert_eq!(doc.page_count, None);
    }

    #[test]
    fn test_strips_bom() {
        let doc = TextExtractor::extract("\u{feff}abscess".to_string());
        assert_eq!(doc.content, "abscess");
    }
}
