//! Sink files: the persisted `label=ipa` output of a source run
//!
//! A sink is UTF-16 text with a leading byte-order mark, one record per
//! line. Sinks are written little-endian; the reader accepts either BOM and
//! CRLF line endings.
//!
//! - `SinkWriter`: truncating or appending writer with durable flushes
//! - `read_records`: strict decoder, malformed content is an error
//! - `load_ignore`: label set of an existing sink, or of its leading bytes
//! - `merge`: first-writer-wins union of several sinks

mod ignore;
mod merge;

pub use ignore::{load_ignore, load_ignore_prefix};
pub use merge::{merge, MergeStats};

use crate::types::ResultRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Little-endian byte-order mark as written by `SinkWriter`
const BOM_LE: [u8; 2] = [0xFF, 0xFE];
/// Big-endian byte-order mark, accepted when reading
const BOM_BE: [u8; 2] = [0xFE, 0xFF];

/// Errors raised while reading or writing sink files
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on sink {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed sink {} at line {line}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl SinkError {
    fn io(path: &Path, source: io::Error) -> Self {
        SinkError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        SinkError::Malformed {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}

/// Buffered UTF-16LE record writer owning one sink file
pub struct SinkWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Bytes handed to the writer so far, including the BOM and any retained prefix
    len: u64,
}

impl SinkWriter {
    /// Create or truncate the sink and write the byte-order mark
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;

        let file = File::create(&path).map_err(|e| SinkError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&BOM_LE)
            .map_err(|e| SinkError::io(&path, e))?;

        Ok(Self {
            path,
            writer,
            len: BOM_LE.len() as u64,
        })
    }

    /// Open the sink for appending, creating it if absent.
    ///
    /// With `truncate_to`, the file is first cut back to that byte length so
    /// anything written after the last durable flush is discarded. The length
    /// must be a record boundary: the end of the byte-order mark or a byte
    /// right after a UTF-16LE newline.
    pub fn append(path: impl AsRef<Path>, truncate_to: Option<u64>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SinkError::io(&path, e))?;

        let existing = file.metadata().map_err(|e| SinkError::io(&path, e))?.len();

        if let Some(target) = truncate_to {
            if target > existing {
                return Err(SinkError::malformed(
                    &path,
                    0,
                    format!("checkpoint length {} exceeds file length {}", target, existing),
                ));
            }
            if target % 2 != 0 {
                return Err(SinkError::malformed(
                    &path,
                    0,
                    format!("checkpoint length {} is not a UTF-16 boundary", target),
                ));
            }
            if !ends_record(&mut file, target).map_err(|e| SinkError::io(&path, e))? {
                return Err(SinkError::malformed(
                    &path,
                    0,
                    format!("checkpoint length {} does not end a record", target),
                ));
            }
            file.set_len(target).map_err(|e| SinkError::io(&path, e))?;
        }

        let mut len = file.metadata().map_err(|e| SinkError::io(&path, e))?.len();

        if len >= 2 {
            let mut bom = [0u8; 2];
            file.seek(SeekFrom::Start(0))
                .map_err(|e| SinkError::io(&path, e))?;
            file.read_exact(&mut bom)
                .map_err(|e| SinkError::io(&path, e))?;
            if bom != BOM_LE {
                return Err(SinkError::malformed(
                    &path,
                    0,
                    "cannot append: sink is not UTF-16LE with BOM",
                ));
            }
            file.seek(SeekFrom::End(0))
                .map_err(|e| SinkError::io(&path, e))?;
        } else {
            // empty (or a stray single byte): start a fresh document
            file.set_len(0).map_err(|e| SinkError::io(&path, e))?;
            file.seek(SeekFrom::Start(0))
                .map_err(|e| SinkError::io(&path, e))?;
            file.write_all(&BOM_LE)
                .map_err(|e| SinkError::io(&path, e))?;
            len = BOM_LE.len() as u64;
        }

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            len,
        })
    }

    /// Append one record line
    pub fn write_record(&mut self, record: &ResultRecord) -> Result<(), SinkError> {
        let mut line = record.to_line();
        line.push('\n');

        let bytes = encode_utf16le(&line);
        self.writer
            .write_all(&bytes)
            .map_err(|e| SinkError::io(&self.path, e))?;
        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Flush buffered records and sync them to disk.
    ///
    /// Returns the durable length of the sink in bytes.
    pub fn flush_durable(&mut self) -> Result<u64, SinkError> {
        self.writer
            .flush()
            .and_then(|_| self.writer.get_ref().sync_data())
            .map_err(|e| SinkError::io(&self.path, e))?;
        Ok(self.len)
    }

    /// Flush and close the sink, returning its final length
    pub fn finish(mut self) -> Result<u64, SinkError> {
        self.flush_durable()
    }
}

/// Whether `offset` sits right after the BOM or after a UTF-16LE `\n`
fn ends_record(file: &mut File, offset: u64) -> io::Result<bool> {
    let bom_len = BOM_LE.len() as u64;
    if offset == bom_len {
        return Ok(true);
    }
    if offset < bom_len + 2 {
        return Ok(false);
    }

    let mut unit = [0u8; 2];
    file.seek(SeekFrom::Start(offset - 2))?;
    file.read_exact(&mut unit)?;
    Ok(unit == [b'\n', 0])
}

fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }
    }
    Ok(())
}

pub(crate) fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Decode a whole sink file into text, validating BOM and encoding
pub(crate) fn decode_sink(path: &Path, bytes: &[u8]) -> Result<String, SinkError> {
    if bytes.is_empty() {
        return Ok(String::new());
    }
    if bytes.len() % 2 != 0 {
        return Err(SinkError::malformed(
            path,
            0,
            format!("odd byte length {} for UTF-16 content", bytes.len()),
        ));
    }

    let (body, little_endian) = match [bytes[0], bytes[1]] {
        BOM_LE => (&bytes[2..], true),
        BOM_BE => (&bytes[2..], false),
        _ => return Err(SinkError::malformed(path, 0, "missing UTF-16 byte-order mark")),
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();

    String::from_utf16(&units).map_err(|e| SinkError::malformed(path, 0, e.to_string()))
}

/// Parse one `label=ipa` line
pub(crate) fn parse_line(path: &Path, line_no: usize, line: &str) -> Result<ResultRecord, SinkError> {
    let mut parts = line.split('=');
    let (label, ipa) = match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(ipa), None) => (label, ipa),
        (_, None, _) => return Err(SinkError::malformed(path, line_no, "missing '=' separator")),
        _ => return Err(SinkError::malformed(path, line_no, "more than one '=' separator")),
    };

    ResultRecord::new(label, ipa)
        .map_err(|e| SinkError::malformed(path, line_no, e.to_string()))
}

/// Read every record of a sink in file order.
///
/// Blank lines are ignored; any other line that is not a single
/// `label=ipa` pair is an error.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<ResultRecord>, SinkError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SinkError::io(path, e))?;
    parse_records(path, &bytes)
}

/// Read the records held in the first `len` bytes of a sink
pub fn read_records_prefix(path: impl AsRef<Path>, len: u64) -> Result<Vec<ResultRecord>, SinkError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SinkError::io(path, e))?;
    let end = usize::try_from(len)
        .ok()
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            SinkError::malformed(
                path,
                0,
                format!("prefix length {} exceeds file length {}", len, bytes.len()),
            )
        })?;
    parse_records(path, &bytes[..end])
}

fn parse_records(path: &Path, bytes: &[u8]) -> Result<Vec<ResultRecord>, SinkError> {
    let text = decode_sink(path, bytes)?;

    let mut records = Vec::new();
    for (idx, raw) in text.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(path, idx + 1, line)?);
    }

    Ok(records)
}

/// Write a complete sink in one pass
pub fn write_records<'a>(
    path: impl AsRef<Path>,
    records: impl IntoIterator<Item = &'a ResultRecord>,
) -> Result<u64, SinkError> {
    let mut writer = SinkWriter::create(path)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish()
}
