//! Scripted web client and dictionary page fixtures
//!
//! `MockWebClient` answers requests from a per-URL script of responses and
//! records every call, so resolver and pipeline behavior can be exercised
//! without a network.

use super::client::{FetchError, WebClient};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// One scripted response
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Successful response with this body
    Page(String),
    /// The request times out
    Timeout,
    /// The server answers with this status
    Status(u16),
}

impl MockResponse {
    fn into_result(self, url: &Url) -> Result<String, FetchError> {
        match self {
            MockResponse::Page(body) => Ok(body),
            MockResponse::Timeout => Err(FetchError::Timeout(Duration::from_secs(10))),
            MockResponse::Status(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}

/// Web client that replays scripted responses.
///
/// Each URL has a queue of responses; the last one repeats once the queue
/// is drained. Unscripted URLs answer 404.
#[derive(Default)]
pub struct MockWebClient {
    routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl MockWebClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for a URL
    pub fn route(&self, url: &Url, responses: Vec<MockResponse>) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.insert(url.to_string(), responses.into());
    }

    /// Script a single page that is always returned for a URL
    pub fn page(&self, url: &Url, body: impl Into<String>) {
        self.route(url, vec![MockResponse::Page(body.into())]);
    }

    /// Every requested URL, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of requests made for a URL
    pub fn call_count(&self, url: &Url) -> usize {
        let url = url.to_string();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|called| **called == url)
            .count()
    }
}

#[async_trait]
impl WebClient for MockWebClient {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());

        let response = {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            match routes.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        response
            .unwrap_or(MockResponse::Status(404))
            .into_result(url)
    }
}

/// HTML fixtures shaped like the dictionary's pages
pub mod pages {
    /// Search page listing entries; the first id is the best match
    pub fn search_result(ids: &[&str]) -> String {
        let results: String = ids
            .iter()
            .map(|id| format!(r#"<li><h3 class="resultTitle" id="{id}"><a href="/dictionary/{id}">{id}</a></h3></li>"#))
            .collect();
        format!(r#"<html><body><ol class="results">{results}</ol></body></html>"#)
    }

    /// Search page suggesting a corrected spelling
    pub fn did_you_mean(suggestion: &str) -> String {
        format!(
            r#"<html><body><div class="didYouMean">Did you mean: <ul><li>{suggestion}</li></ul></div></body></html>"#
        )
    }

    /// Search page with no suggestion and no results
    pub fn no_results() -> String {
        r#"<html><body><p class="noResults">No results found.</p></body></html>"#.to_string()
    }

    /// Pronunciation tab with one block per `(header, entries)` group.
    ///
    /// Entries are written as `"Region: /ipa/"`.
    pub fn pronunciations(groups: &[(Option<&str>, &[&str])]) -> String {
        let blocks: String = groups
            .iter()
            .map(|(header, entries)| {
                let header = header
                    .map(|h| format!(r#"<div class="header">{h}</div>"#))
                    .unwrap_or_default();
                let entries: String = entries
                    .iter()
                    .map(|entry| {
                        let (region, ipa) = entry.split_once(':').unwrap_or(("", *entry));
                        format!(
                            r#"<div class="regional-pronunciation"><span class="region">{}:</span> <span class="pronunciation-ipa">{}</span></div>"#,
                            region.trim(),
                            ipa.trim()
                        )
                    })
                    .collect();
                format!(r#"<div class="pronunciation-group">{header}{entries}</div>"#)
            })
            .collect();
        format!(r#"<html><body><section id="pronunciation_groups">{blocks}</section></body></html>"#)
    }
}
