//! Core types for the pronlex pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A candidate word or phrase extracted from a source document
pub type Term = String;

// ============================================================================
// Dictionary Types
// ============================================================================

/// Canonical dictionary entry identifier returned by search (e.g. `nephritis_n`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Headword(pub String);

impl Headword {
    /// Create a headword from the provider's entry identifier
    pub fn new(id: impl Into<String>) -> Self {
        Headword(id.into())
    }

    /// Get the underlying identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The entry text before any `_` disambiguation suffix
    pub fn root(&self) -> &str {
        self.0.split('_').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Headword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One labeled pronunciation extracted from a headword's pronunciation tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationGroup {
    /// Label the pronunciation is stored under
    pub label: String,
    /// IPA transcription without the surrounding slashes
    pub ipa: String,
}

impl PronunciationGroup {
    pub fn new(label: impl Into<String>, ipa: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ipa: ipa.into(),
        }
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// Reasons a record cannot be represented in the `label=ipa` line format
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("label is empty")]
    EmptyLabel,
    #[error("{field} contains reserved character {ch:?}: {value:?}")]
    ReservedChar {
        field: &'static str,
        ch: char,
        value: String,
    },
}

/// A `(label, ipa)` pair as written to a sink.
///
/// Only constructed through `ResultRecord::new`, which rejects characters the
/// line format cannot carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResultRecord {
    pub label: String,
    pub ipa: String,
}

impl ResultRecord {
    /// Create a record, rejecting characters the line format cannot carry
    pub fn new(label: impl Into<String>, ipa: impl Into<String>) -> Result<Self, RecordError> {
        let label = label.into();
        let ipa = ipa.into();

        if label.is_empty() {
            return Err(RecordError::EmptyLabel);
        }
        check_field("label", &label)?;
        check_field("ipa", &ipa)?;

        Ok(Self { label, ipa })
    }

    /// Render as a sink line (without the trailing newline)
    pub fn to_line(&self) -> String {
        format!("{}={}", self.label, self.ipa)
    }
}

impl TryFrom<PronunciationGroup> for ResultRecord {
    type Error = RecordError;

    fn try_from(group: PronunciationGroup) -> Result<Self, Self::Error> {
        ResultRecord::new(group.label, group.ipa)
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), RecordError> {
    match value.chars().find(|c| matches!(c, '=' | '\n' | '\r')) {
        Some(ch) => Err(RecordError::ReservedChar {
            field,
            ch,
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}
