//! Ordered merge of several sinks into one lexicon

use super::{read_records, SinkError, SinkWriter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Merge statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Sinks read
    pub sinks: usize,
    /// Records read across all sinks
    pub records_read: usize,
    /// Records written to the destination
    pub unique_written: usize,
    /// Records dropped because their label was already written
    pub duplicates: usize,
}

/// Merge sinks in the given order; the first record for a label wins.
///
/// Every sink is read before the destination is touched, and the
/// destination is replaced atomically, so a failing sink leaves any
/// previous merged output intact.
pub fn merge(sinks: &[PathBuf], destination: impl AsRef<Path>) -> Result<MergeStats, SinkError> {
    let destination = destination.as_ref();
    let mut stats = MergeStats::default();
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for sink in sinks {
        let records = read_records(sink)?;
        info!("Read {} records from {}", records.len(), sink.display());

        stats.sinks += 1;
        stats.records_read += records.len();

        for record in records {
            if seen.insert(record.label.clone()) {
                merged.push(record);
            } else {
                stats.duplicates += 1;
            }
        }
    }

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| SinkError::io(&dir, e))?;

    let staging = tempfile::NamedTempFile::new_in(&dir).map_err(|e| SinkError::io(&dir, e))?;
    let mut writer = SinkWriter::create(staging.path())?;
    for record in &merged {
        writer.write_record(record)?;
    }
    writer.finish()?;

    staging
        .persist(destination)
        .map_err(|e| SinkError::io(destination, e.error))?;

    stats.unique_written = merged.len();
    info!(
        "Merged {} sinks into {}: {} read, {} unique, {} duplicates",
        stats.sinks,
        destination.display(),
        stats.records_read,
        stats.unique_written,
        stats.duplicates
    );

    Ok(stats)
}
