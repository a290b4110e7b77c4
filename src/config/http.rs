//! Dictionary site and resolver configuration

use crate::resolver::{FetchConfig, RetryPolicy, DEFAULT_MAX_CORRECTION_HOPS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DEFAULT_USER_AGENT;

/// Default dictionary site
pub const DEFAULT_BASE_URL: &str = "https://www.oed.com";

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Root URL of the dictionary site
    pub base_url: String,
    /// User agent string
    pub user_agent: String,
    /// Page-load timeout per request (seconds)
    pub timeout_secs: u64,
    /// Minimum spacing between consecutive requests (milliseconds)
    pub request_delay_ms: u64,
    /// Maximum response size (bytes)
    pub max_content_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            request_delay_ms: 0,
            max_content_size: 10 * 1024 * 1024,
        }
    }
}

impl HttpConfig {
    /// Client settings derived from this section
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.timeout_secs),
            request_delay: Duration::from_millis(self.request_delay_ms),
            max_content_size: self.max_content_size,
        }
    }
}

/// Resolver retry and correction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts (seconds)
    pub retry_delay_secs: u64,
    /// Spelling corrections followed before giving up on a term
    pub max_correction_hops: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 2,
            max_correction_hops: DEFAULT_MAX_CORRECTION_HOPS,
        }
    }
}

impl ResolverConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_conversion() {
        let http = HttpConfig {
            request_delay_ms: 250,
            ..Default::default()
        };
        let fetch = http.fetch_config();
        assert_eq!(fetch.timeout, Duration::from_secs(10));
        assert_eq!(fetch.request_delay, Duration::from_millis(250));
        assert_eq!(fetch.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = ResolverConfig::default().retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay(), Duration::from_secs(2));
    }
}
