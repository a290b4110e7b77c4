//! Declarative cleanup policies for term extraction
//!
//! Each document source names one policy. Policies are plain data so new
//! sources can be described in configuration without code changes.

use super::ExtractError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the policy used by the Core Radiology index
pub const CORE_RADIOLOGY: &str = "core-radiology";
/// Name of the policy shared by the Diagnostic Imaging volumes
pub const DIAGNOSTIC_IMAGING: &str = "diagnostic-imaging";
/// Name of the policy for flat word lists
pub const WORD_LIST: &str = "word-list";

/// Cleanup rules applied to each body line of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupPolicy {
    /// Regex whose matches are deleted from every line before splitting
    #[serde(default)]
    pub remove: Option<String>,
    /// Regex matching token delimiters
    #[serde(default = "default_split")]
    pub split: String,
    /// Trim leading/trailing non-alphanumeric characters from each token
    #[serde(default = "default_true")]
    pub trim_punctuation: bool,
    /// Lowercase every token
    #[serde(default)]
    pub lowercase: bool,
    /// Tokens shorter than this (in characters) are dropped
    #[serde(default = "default_min_len")]
    pub min_len: usize,
}

fn default_split() -> String {
    r"[\s,]+".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_len() -> usize {
    3
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            remove: None,
            split: default_split(),
            trim_punctuation: true,
            lowercase: false,
            min_len: default_min_len(),
        }
    }
}

impl CleanupPolicy {
    /// Compile the policy's patterns
    pub fn compile(&self, name: &str) -> Result<CompiledPolicy, ExtractError> {
        let invalid = |source| ExtractError::InvalidPattern {
            policy: name.to_string(),
            source,
        };

        let remove = match &self.remove {
            Some(pattern) => Some(Regex::new(pattern).map_err(invalid)?),
            None => None,
        };
        let split = Regex::new(&self.split).map_err(invalid)?;

        Ok(CompiledPolicy {
            remove,
            split,
            trim_punctuation: self.trim_punctuation,
            lowercase: self.lowercase,
            min_len: self.min_len,
        })
    }
}

/// A policy with its patterns compiled, ready to apply
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub(crate) remove: Option<Regex>,
    pub(crate) split: Regex,
    pub(crate) trim_punctuation: bool,
    pub(crate) lowercase: bool,
    pub(crate) min_len: usize,
}

impl CompiledPolicy {
    /// Turn one line into its surviving tokens
    pub fn tokens(&self, line: &str) -> Vec<String> {
        let cleaned = match &self.remove {
            Some(re) => re.replace_all(line, "").into_owned(),
            None => line.to_string(),
        };

        self.split
            .split(&cleaned)
            .map(|token| {
                let token = token.trim();
                let token = if self.trim_punctuation {
                    token.trim_matches(|c: char| !c.is_alphanumeric())
                } else {
                    token
                };
                if self.lowercase {
                    token.to_lowercase()
                } else {
                    token.to_string()
                }
            })
            .filter(|token| token.chars().count() >= self.min_len)
            .collect()
    }
}

/// Policies shipped with the default configuration
pub fn builtin_policies() -> BTreeMap<String, CleanupPolicy> {
    let mut policies = BTreeMap::new();

    // Index entries look like "Nephritis, 12, 14/ (see also Kidney)"
    policies.insert(
        CORE_RADIOLOGY.to_string(),
        CleanupPolicy {
            remove: Some(r"[0-9]+".to_string()),
            split: r"[\s,/()]+".to_string(),
            trim_punctuation: true,
            lowercase: false,
            min_len: 3,
        },
    );

    policies.insert(
        DIAGNOSTIC_IMAGING.to_string(),
        CleanupPolicy {
            remove: Some(
                r#"\b[0-9]+(?:st|nd|rd|th)\b|vs\.|["“”]|[0-9]|[()]|- |&|[.;:!?]"#.to_string(),
            ),
            split: r"[\s,]+".to_string(),
            trim_punctuation: true,
            lowercase: true,
            min_len: 3,
        },
    );

    policies.insert(
        WORD_LIST.to_string(),
        CleanupPolicy {
            remove: None,
            split: r"[\s,]+".to_string(),
            trim_punctuation: true,
            lowercase: true,
            min_len: 3,
        },
    );

    policies
}
