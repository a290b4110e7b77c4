//! Source documents, sinks, and output configuration

use crate::batch::DEFAULT_CHECKPOINT_INTERVAL;
use crate::extract::{CORE_RADIOLOGY, DIAGNOSTIC_IMAGING};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One reference document and the sink its pronunciations go to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short unique name used on the command line
    pub name: String,
    /// PDF or text document
    pub document: PathBuf,
    /// ASCII text cache of the document (PDF sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_cache: Option<PathBuf>,
    /// Sink file for this source
    pub sink: PathBuf,
    /// 1-based line where the index (or term list) starts
    #[serde(default = "default_index_line")]
    pub index_line: usize,
    /// Name of the cleanup policy used for extraction
    pub policy: String,
}

fn default_index_line() -> usize {
    1
}

impl SourceConfig {
    fn resolve_paths(&mut self, base: &Path) {
        self.document = resolve(base, &self.document);
        self.text_cache = self.text_cache.as_ref().map(|p| resolve(base, p));
        self.sink = resolve(base, &self.sink);
    }
}

/// Batch writer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Terms between durable flushes and checkpoints
    pub checkpoint_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

/// Merged output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination of the merged lexicon
    pub merged: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            merged: PathBuf::from("out/lexicon.txt"),
        }
    }
}

impl OutputConfig {
    pub(super) fn resolve_paths(&mut self, base: &Path) {
        self.merged = resolve(base, &self.merged);
    }
}

/// Sources shipped in a fresh configuration
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "core-rad".to_string(),
            document: PathBuf::from(
                "pdfs/Core Radiology A Visual Approach to Diagnostic Imaging (Jacob Mandell).pdf",
            ),
            text_cache: Some(PathBuf::from("pdfs/core_rad.txt")),
            sink: PathBuf::from("out/_out_core_rad.txt"),
            index_line: 36197,
            policy: CORE_RADIOLOGY.to_string(),
        },
        SourceConfig {
            name: "dia-head".to_string(),
            document: PathBuf::from(
                "pdfs/Diagnostic Imaging Head and Neck (Bernadette L. Koch MD, Surjith Vattoth MD FRCR etc.).pdf",
            ),
            text_cache: Some(PathBuf::from("pdfs/dia_head.txt")),
            sink: PathBuf::from("out/_out_dia_head.txt"),
            index_line: 110410,
            policy: DIAGNOSTIC_IMAGING.to_string(),
        },
    ]
}

pub(super) fn resolve_sources(sources: &mut [SourceConfig], base: &Path) {
    for source in sources {
        source.resolve_paths(base);
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || base.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
