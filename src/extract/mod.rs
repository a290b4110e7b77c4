//! Candidate term extraction from document text
//!
//! Skips front matter up to the source's index line, then applies the
//! source's cleanup policy to every remaining line. The result is a sorted
//! set, which is also the order the batch writer visits terms in.

mod policy;

pub use policy::{
    builtin_policies, CleanupPolicy, CompiledPolicy, CORE_RADIOLOGY, DIAGNOSTIC_IMAGING, WORD_LIST,
};

use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Errors that can occur while preparing extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid pattern in policy '{policy}': {source}")]
    InvalidPattern {
        policy: String,
        #[source]
        source: regex::Error,
    },
}

/// Extract the unique candidate terms of a document.
///
/// `start_line` is 1-based: lines before it are front matter and ignored
/// (0 and 1 both mean "from the first line"). Tokens already in `ignore`
/// are dropped.
pub fn extract_terms(
    text: &str,
    start_line: usize,
    policy: &CompiledPolicy,
    ignore: &HashSet<String>,
) -> BTreeSet<String> {
    let skip = start_line.saturating_sub(1);

    let terms: BTreeSet<String> = text
        .lines()
        .skip(skip)
        .flat_map(|line| policy.tokens(line))
        .filter(|token| !ignore.contains(token))
        .collect();

    tracing::debug!("Extracted {} candidate terms", terms.len());
    terms
}
