//! Run checkpoints for resuming an interrupted batch

use super::BatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to a sink's file name to locate its checkpoint
pub const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// Resume record persisted beside a sink at every durable flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Name of the source being written
    pub source: String,
    /// Sink file path
    pub sink: PathBuf,
    /// Index of the first term not yet processed
    pub next_index: usize,
    /// Durable sink length in bytes at the time of the checkpoint
    pub sink_len: u64,
    /// Terms that produced pronunciation groups, across resumed runs
    pub terms_written: usize,
    /// Records written, across resumed runs
    pub records_written: usize,
    /// Set by incremental runs: the candidate set left out the labels held
    /// in this many leading bytes of the sink when the run started
    #[serde(default)]
    pub own_sink_prefix: Option<u64>,
    /// When the checkpoint was taken
    pub timestamp: DateTime<Utc>,
}

impl RunCheckpoint {
    /// Create a checkpoint stamped with the current time
    pub fn new(
        source: impl Into<String>,
        sink: impl Into<PathBuf>,
        next_index: usize,
        sink_len: u64,
        terms_written: usize,
        records_written: usize,
    ) -> Self {
        Self {
            source: source.into(),
            sink: sink.into(),
            next_index,
            sink_len,
            terms_written,
            records_written,
            own_sink_prefix: None,
            timestamp: Utc::now(),
        }
    }

    /// Record the own-sink prefix an incremental run excluded
    pub fn with_own_sink_prefix(mut self, prefix: Option<u64>) -> Self {
        self.own_sink_prefix = prefix;
        self
    }

    /// Save checkpoint to file.
    ///
    /// The JSON is staged in a temporary file beside `path` and renamed over
    /// it, so an interrupted save leaves the previous checkpoint intact.
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| BatchError::checkpoint(path, e))?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| BatchError::checkpoint(path, e))?;

        let mut staging =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| BatchError::checkpoint(path, e))?;
        staging
            .write_all(json.as_bytes())
            .and_then(|_| staging.as_file().sync_data())
            .map_err(|e| BatchError::checkpoint(path, e))?;
        staging
            .persist(path)
            .map_err(|e| BatchError::checkpoint(path, e.error))?;
        Ok(())
    }

    /// Load checkpoint from file
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let json = std::fs::read_to_string(path).map_err(|e| BatchError::checkpoint(path, e))?;
        serde_json::from_str(&json).map_err(|e| BatchError::checkpoint(path, e))
    }

    /// Load the checkpoint if one exists
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, BatchError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Checkpoint location for a sink: `<sink>.checkpoint.json`
pub fn checkpoint_path(sink: &Path) -> PathBuf {
    let mut name = sink
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(CHECKPOINT_SUFFIX);
    sink.with_file_name(name)
}
