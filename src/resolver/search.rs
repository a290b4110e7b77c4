//! Interpretation of dictionary search result pages

use super::page::{element_text, selector, PageError};
use crate::types::Headword;
use scraper::Html;

/// What a search page says about the queried phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The provider suggests a corrected spelling to search instead
    Correction(String),
    /// An entry matched; its canonical identifier
    Headword(Headword),
    /// Neither a suggestion nor a result
    NotFound,
}

/// Parse a search results page.
///
/// A "did you mean" block takes precedence over any listed result.
pub fn parse_search_page(html: &str) -> Result<SearchOutcome, PageError> {
    let document = Html::parse_document(html);

    let did_you_mean = selector(".didYouMean")?;
    let suggestion_item = selector("ul li")?;
    let suggestion_list = selector("ul")?;
    let result_title = selector(".resultTitle")?;

    if let Some(block) = document.select(&did_you_mean).next() {
        let suggestion = block
            .select(&suggestion_item)
            .next()
            .or_else(|| block.select(&suggestion_list).next())
            .map(|el| element_text(&el))
            .unwrap_or_default();

        if !suggestion.is_empty() {
            return Ok(SearchOutcome::Correction(suggestion));
        }
        tracing::debug!("Empty did-you-mean block, falling back to results");
    }

    let headword = document
        .select(&result_title)
        .next()
        .and_then(|el| el.value().attr("id"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Headword::new);

    Ok(match headword {
        Some(hw) => SearchOutcome::Headword(hw),
        None => SearchOutcome::NotFound,
    })
}
