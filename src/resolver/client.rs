//! Web client used by the resolver
//!
//! The resolver only needs "give me the HTML at this URL". `WebClient` is
//! that seam; `HttpWebClient` implements it over reqwest with a per-request
//! timeout and an optional minimum spacing between requests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
}

impl FetchError {
    /// Whether another attempt at the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::ContentTooLarge(_) => false,
        }
    }
}

/// Synchronous-in-spirit page fetcher: one request at a time, caller awaits
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Fetch the page at `url` and return its body
    async fn get(&self, url: &Url) -> Result<String, FetchError>;
}

#[async_trait]
impl<C: WebClient + ?Sized> WebClient for &C {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        (**self).get(url).await
    }
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// Page-load timeout for a single request
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Minimum spacing between consecutive requests
    pub request_delay: Duration,
    /// Maximum response size (bytes)
    pub max_content_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            request_delay: Duration::ZERO,
            max_content_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// reqwest-backed web client
pub struct HttpWebClient {
    http_client: reqwest::Client,
    config: FetchConfig,
    /// When the previous request was sent
    last_request: Mutex<Option<Instant>>,
}

impl HttpWebClient {
    /// Create a new HTTP client
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Wait until the configured spacing since the previous request has passed
    async fn pace(&self) {
        if self.config.request_delay.is_zero() {
            return;
        }

        let wait = {
            let mut last = self.last_request.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let wait = last
                .map(|at| self.config.request_delay.saturating_sub(now.duration_since(at)))
                .unwrap_or(Duration::ZERO);
            *last = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            tracing::trace!("Pacing request for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl WebClient for HttpWebClient {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        self.pace().await;
        let start = Instant::now();

        let response = self
            .http_client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.config.max_content_size {
                return Err(FetchError::ContentTooLarge(len as usize));
            }
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        if body.len() > self.config.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len()));
        }

        tracing::debug!("Fetched {} ({} bytes) in {:?}", url, body.len(), start.elapsed());
        Ok(body)
    }
}

impl HttpWebClient {
    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::Http(e)
        }
    }
}
