//! Small helpers over scraper shared by the page parsers

use scraper::{ElementRef, Selector};
use thiserror::Error;

/// Errors raised while interpreting a fetched page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid selector '{css}': {reason}")]
    Selector { css: String, reason: String },
}

/// Compile a CSS selector
pub(crate) fn selector(css: &str) -> Result<Selector, PageError> {
    Selector::parse(css).map_err(|e| PageError::Selector {
        css: css.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Rendered text of an element with whitespace collapsed, as a browser shows it
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
