//! Label sets of previously written sinks

use super::{read_records, read_records_prefix, SinkError};
use std::collections::HashSet;
use std::path::Path;

/// Collect the labels already present in a sink.
///
/// A sink that does not exist yields an empty set. A sink that exists but
/// cannot be decoded is an error, never an empty set.
pub fn load_ignore(path: impl AsRef<Path>) -> Result<HashSet<String>, SinkError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let labels: HashSet<String> = read_records(path)?
        .into_iter()
        .map(|record| record.label)
        .collect();

    tracing::debug!("Loaded {} ignore labels from {}", labels.len(), path.display());
    Ok(labels)
}

/// Labels held in the first `len` bytes of a sink.
///
/// An append-only sink keeps its earlier content as a prefix, so this
/// recovers the label set it had when its length was `len`.
pub fn load_ignore_prefix(path: impl AsRef<Path>, len: u64) -> Result<HashSet<String>, SinkError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(HashSet::new());
    }

    Ok(read_records_prefix(path, len)?
        .into_iter()
        .map(|record| record.label)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{encode_utf16le, write_records, BOM_LE};
    use crate::types::ResultRecord;
    use tempfile::TempDir;

    #[test]
    fn test_missing_sink_is_empty() {
        let dir = TempDir::new().unwrap();
        let labels = load_ignore(dir.path().join("absent.txt")).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_labels_of_persisted_sink() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let records = vec![
            ResultRecord::new("cat", "/kæt/").unwrap(),
            ResultRecord::new("dog", "/dɒg/").unwrap(),
        ];
        write_records(&path, &records).unwrap();

        let labels = load_ignore(&path).unwrap();
        let expected: HashSet<String> = ["cat", "dog"].iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_malformed_sink_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let mut bytes = BOM_LE.to_vec();
        bytes.extend(encode_utf16le("cat=kæt=extra\n"));
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(load_ignore(&path), Err(SinkError::Malformed { .. })));
    }

    #[test]
    fn test_empty_file_is_empty_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, b"").unwrap();

        assert!(load_ignore(&path).unwrap().is_empty());
    }
}
