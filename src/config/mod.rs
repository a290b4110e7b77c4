//! Configuration for pronlex

mod http;
mod logging;
mod sources;

pub use http::{HttpConfig, ResolverConfig, DEFAULT_BASE_URL};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use sources::{default_sources, BatchConfig, OutputConfig, SourceConfig};

use crate::extract::{builtin_policies, CleanupPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Default user agent for all dictionary requests
pub const DEFAULT_USER_AGENT: &str = "pronlex/0.1 (+https://github.com/pronlex/pronlex)";

/// Configuration file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "pronlex.toml";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Dictionary site and HTTP client
    #[serde(default)]
    pub http: HttpConfig,
    /// Retry and correction-follow settings
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Batch writer settings
    #[serde(default)]
    pub batch: BatchConfig,
    /// Merged output
    #[serde(default)]
    pub output: OutputConfig,
    /// Cleanup policies by name; built-in policies are used for names not listed
    #[serde(default)]
    pub policies: BTreeMap<String, CleanupPolicy>,
    /// Sources in the order they are processed and merged
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            resolver: ResolverConfig::default(),
            batch: BatchConfig::default(),
            output: OutputConfig::default(),
            policies: BTreeMap::new(),
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Relative paths in the file are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        config.resolve_paths(path.parent().unwrap_or_else(|| Path::new("")));
        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write this configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file '{}'", path.display()))
    }

    /// Make relative paths absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        sources::resolve_sources(&mut self.sources, base);
        self.output.resolve_paths(base);
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if let Err(e) = url::Url::parse(&self.http.base_url) {
            errors.push(format!("http.base_url '{}' is invalid: {}", self.http.base_url, e));
        }
        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be positive".to_string());
        }
        if self.resolver.max_attempts == 0 {
            errors.push("resolver.max_attempts must be positive".to_string());
        }
        if self.batch.checkpoint_interval == 0 {
            errors.push("batch.checkpoint_interval must be positive".to_string());
        }

        for (name, policy) in &self.policies {
            if let Err(e) = policy.compile(name) {
                errors.push(e.to_string());
            }
        }

        let mut names = HashSet::new();
        let mut sinks = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                errors.push("source name must not be empty".to_string());
            }
            if !names.insert(source.name.as_str()) {
                errors.push(format!("duplicate source name '{}'", source.name));
            }
            if !sinks.insert(source.sink.as_path()) {
                errors.push(format!(
                    "source '{}' shares sink {} with an earlier source",
                    source.name,
                    source.sink.display()
                ));
            }
            if self.policy(&source.policy).is_none() {
                errors.push(format!(
                    "source '{}' uses unknown policy '{}'",
                    source.name, source.policy
                ));
            }
            if source.text_cache.as_deref() == Some(source.document.as_path()) {
                errors.push(format!(
                    "source '{}' text_cache must differ from its document",
                    source.name
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// Look up a cleanup policy, falling back to the built-in table
    pub fn policy(&self, name: &str) -> Option<CleanupPolicy> {
        self.policies
            .get(name)
            .cloned()
            .or_else(|| builtin_policies().remove(name))
    }

    /// Position of a source in declaration order
    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name == name)
    }

    /// Look up a source by name
    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name).with_context(|| {
            let known: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
            format!("Unknown source '{}' (configured: {})", name, known.join(", "))
        })
    }

    /// Sinks of all sources, in declaration order
    pub fn sink_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| s.sink.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn default_config_passes_validation() {
        let cfg = valid_config();
        assert!(cfg.validate().is_ok(), "default config should be valid");
    }

    #[test]
    fn validate_collects_every_error() {
        let mut cfg = valid_config();
        cfg.http.base_url = "not a url".to_string();
        cfg.resolver.max_attempts = 0;
        cfg.batch.checkpoint_interval = 0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("http.base_url"), "unexpected error message: {}", err);
        assert!(err.contains("resolver.max_attempts must be positive"));
        assert!(err.contains("batch.checkpoint_interval must be positive"));
    }

    #[test]
    fn validate_rejects_duplicate_sources_and_sinks() {
        let mut cfg = valid_config();
        let first = cfg.sources[0].clone();
        cfg.sources.push(first);
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate source name 'core-rad'"));
        assert!(err.contains("shares sink"));
    }

    #[test]
    fn validate_rejects_unknown_policy() {
        let mut cfg = valid_config();
        cfg.sources[0].policy = "no-such-policy".to_string();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("unknown policy 'no-such-policy'"));
    }

    #[test]
    fn validate_rejects_bad_policy_pattern() {
        let mut cfg = valid_config();
        cfg.policies.insert(
            "broken".to_string(),
            CleanupPolicy {
                split: "[".to_string(),
                ..Default::default()
            },
        );
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("invalid pattern in policy 'broken'"));
    }

    #[test]
    fn user_policy_overrides_builtin() {
        let mut cfg = valid_config();
        assert!(cfg.policy("word-list").is_some());
        cfg.policies.insert(
            "word-list".to_string(),
            CleanupPolicy {
                min_len: 1,
                ..Default::default()
            },
        );
        assert_eq!(cfg.policy("word-list").unwrap().min_len, 1);
    }

    #[test]
    fn source_lookup() {
        let cfg = valid_config();
        assert_eq!(cfg.source_index("dia-head"), Some(1));
        assert_eq!(cfg.source("core-rad").unwrap().index_line, 36197);
        let err = cfg.source("nope").unwrap_err().to_string();
        assert!(err.contains("configured: core-rad, dia-head"));
    }

    #[test]
    fn save_then_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pronlex.toml");
        valid_config().save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sources.len(), 2);
        assert_eq!(loaded.sources[0].sink, dir.path().join("out/_out_core_rad.txt"));
        assert_eq!(loaded.output.merged, dir.path().join("out/lexicon.txt"));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.sources, default_sources());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pronlex.toml");
        std::fs::write(&path, "[http]\nrequest_delay_ms = 500\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.http.request_delay_ms, 500);
        assert_eq!(cfg.http.timeout_secs, 10);
        assert_eq!(cfg.resolver.max_attempts, 3);
        assert_eq!(cfg.batch.checkpoint_interval, 50);
    }
}
