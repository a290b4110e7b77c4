//! Term resolution against the online dictionary
//!
//! Resolution is two lookups:
//! - `search`: term → headword, following "did you mean" corrections
//! - `fetch_pronunciations`: headword → labeled IPA groups
//!
//! Every request goes through the `RetryPolicy`. Unresolvable terms and
//! entries without pronunciation data are ordinary outcomes (`None`, empty
//! list); only failed requests and runaway correction chains are errors.

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod page;
pub mod pronunciation;
pub mod retry;
pub mod search;

pub use client::{FetchConfig, FetchError, HttpWebClient, WebClient};
pub use page::PageError;
pub use retry::{RetryFailure, RetryPolicy};
pub use search::SearchOutcome;

use crate::types::{Headword, PronunciationGroup};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Default bound on followed spelling corrections per search
pub const DEFAULT_MAX_CORRECTION_HOPS: usize = 5;

/// Errors that can occur while resolving a term
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("request for {url} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: FetchError,
    },

    #[error("request for {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("correction chain for '{term}' {reason}: {}", .chain.join(" -> "))]
    CorrectionChain {
        term: String,
        chain: Vec<String>,
        reason: &'static str,
    },

    #[error("cannot build URL: {0}")]
    Url(String),

    #[error("unreadable page: {0}")]
    Page(#[from] PageError),
}

impl ResolveError {
    /// Short reason class used when logging a skipped term
    pub fn reason_class(&self) -> &'static str {
        match self {
            ResolveError::RetriesExhausted { .. } => "retries-exhausted",
            ResolveError::CorrectionChain { .. } => "correction-chain",
            _ => "unexpected",
        }
    }
}

/// URL layout of the dictionary site
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Create endpoints rooted at `base` (e.g. `https://www.oed.com`)
    pub fn new(base: Url) -> Result<Self, ResolveError> {
        if base.cannot_be_a_base() {
            return Err(ResolveError::Url(format!("{} cannot be a base URL", base)));
        }
        Ok(Self { base })
    }

    /// Parse and validate a base URL
    pub fn parse(base: &str) -> Result<Self, ResolveError> {
        let url = Url::parse(base).map_err(|e| ResolveError::Url(format!("{}: {}", base, e)))?;
        Self::new(url)
    }

    /// `{base}/search/dictionary/?scope=Entries&q={term}`
    pub fn search_url(&self, term: &str) -> Result<Url, ResolveError> {
        let mut url = self.with_segments(&["search", "dictionary", ""])?;
        url.query_pairs_mut()
            .append_pair("scope", "Entries")
            .append_pair("q", term);
        Ok(url)
    }

    /// `{base}/dictionary/{headword}?tab=pronunciation`
    pub fn pronunciation_url(&self, headword: &Headword) -> Result<Url, ResolveError> {
        let mut url = self.with_segments(&["dictionary", headword.as_str()])?;
        url.query_pairs_mut().append_pair("tab", "pronunciation");
        Ok(url)
    }

    fn with_segments(&self, segments: &[&str]) -> Result<Url, ResolveError> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ResolveError::Url(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Resolves terms to pronunciations through a web client
pub struct Resolver<C> {
    client: C,
    endpoints: Endpoints,
    retry: RetryPolicy,
    max_correction_hops: usize,
}

impl<C: WebClient> Resolver<C> {
    /// Create a resolver that owns `client` for its lifetime
    pub fn new(client: C, endpoints: Endpoints, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoints,
            retry,
            max_correction_hops: DEFAULT_MAX_CORRECTION_HOPS,
        }
    }

    /// Set the bound on followed corrections
    pub fn with_max_correction_hops(mut self, hops: usize) -> Self {
        self.max_correction_hops = hops;
        self
    }

    /// Find the headword for a term, following spelling corrections.
    ///
    /// Returns `Ok(None)` when the dictionary has neither a match nor a
    /// suggestion. A correction chain longer than the hop bound, or one
    /// that revisits a phrase, is an error.
    pub async fn search(&self, term: &str) -> Result<Option<Headword>, ResolveError> {
        let mut chain = vec![term.to_string()];
        let mut seen: HashSet<String> = HashSet::from([term.to_lowercase()]);
        let mut phrase = term.to_string();

        loop {
            let url = self.endpoints.search_url(&phrase)?;
            let html = self.get_page(&url).await?;

            match search::parse_search_page(&html)? {
                SearchOutcome::Headword(headword) => {
                    debug!("Resolved '{}' to {}", term, headword);
                    return Ok(Some(headword));
                }
                SearchOutcome::NotFound => return Ok(None),
                SearchOutcome::Correction(next) => {
                    chain.push(next.clone());
                    if chain.len() - 1 > self.max_correction_hops {
                        return Err(ResolveError::CorrectionChain {
                            term: term.to_string(),
                            chain,
                            reason: "exceeded the hop limit",
                        });
                    }
                    if !seen.insert(next.to_lowercase()) {
                        return Err(ResolveError::CorrectionChain {
                            term: term.to_string(),
                            chain,
                            reason: "loops",
                        });
                    }
                    debug!("'{}' corrected to '{}'", phrase, next);
                    phrase = next;
                }
            }
        }
    }

    /// Fetch the pronunciation groups of a headword.
    ///
    /// An entry without pronunciation data yields an empty list.
    pub async fn fetch_pronunciations(
        &self,
        headword: &Headword,
    ) -> Result<Vec<PronunciationGroup>, ResolveError> {
        let url = self.endpoints.pronunciation_url(headword)?;
        let html = self.get_page(&url).await?;
        Ok(pronunciation::parse_pronunciation_page(&html, headword)?)
    }

    async fn get_page(&self, url: &Url) -> Result<String, ResolveError> {
        self.retry
            .execute(|| self.client.get(url))
            .await
            .map_err(|failure| {
                if failure.exhausted {
                    ResolveError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: failure.attempts,
                        source: failure.error,
                    }
                } else {
                    ResolveError::Fetch {
                        url: url.to_string(),
                        source: failure.error,
                    }
                }
            })
    }
}
