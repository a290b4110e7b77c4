//! Batch writer: resolves a candidate set term by term into a sink
//!
//! Terms are visited in their stable lexicographic order so a skip offset
//! taken from a checkpoint lands on the same term on the next run. Every
//! `checkpoint_interval` terms the sink is flushed and synced and a
//! `RunCheckpoint` is written beside it. A checkpoint is also written as soon
//! as the sink is opened, so a checkpoint from an earlier run never outlives
//! the sink content it describes.

mod checkpoint;
mod progress;

pub use checkpoint::{checkpoint_path, RunCheckpoint, CHECKPOINT_SUFFIX};
pub use progress::{estimate_remaining, BatchProgress, CheckpointReport, TermOutcome};

use crate::resolver::{Resolver, WebClient};
use crate::sink::{self, SinkError, SinkWriter};
use crate::types::ResultRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of terms between durable flushes
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50;

/// Errors that abort a batch run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("checkpoint {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },
}

impl BatchError {
    fn checkpoint(path: &Path, reason: impl fmt::Display) -> Self {
        BatchError::Checkpoint {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// How the sink is opened at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkMode {
    /// Fresh run: the sink is truncated
    #[default]
    Truncate,
    /// Keep existing records, optionally cutting the file back to a
    /// checkpointed length first
    Append { truncate_to: Option<u64> },
}

/// Options for one writer run
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Number of leading terms to count without resolving
    pub skip: usize,
    /// Stop once this many terms have been written
    pub max_count: Option<usize>,
    pub mode: SinkMode,
    /// Recorded in checkpoints so a resumed incremental run rebuilds the
    /// same candidate set
    pub own_sink_prefix: Option<u64>,
    /// Terms written by the runs this one resumes
    pub carried_terms: usize,
    /// Records written by the runs this one resumes
    pub carried_records: usize,
}

impl WriteOptions {
    /// Options for continuing from a checkpoint
    pub fn resume_from(checkpoint: &RunCheckpoint) -> Self {
        Self {
            skip: checkpoint.next_index,
            max_count: None,
            mode: SinkMode::Append {
                truncate_to: Some(checkpoint.sink_len),
            },
            own_sink_prefix: checkpoint.own_sink_prefix,
            carried_terms: checkpoint.terms_written,
            carried_records: checkpoint.records_written,
        }
    }
}

/// Statistics for one writer run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteStats {
    /// Size of the candidate set
    pub terms_total: usize,
    /// Terms counted, including skipped ones
    pub terms_visited: usize,
    /// Terms passed over by the skip offset
    pub skipped_by_offset: usize,
    /// Terms that produced pronunciation groups
    pub terms_written: usize,
    /// Records written to the sink
    pub records_written: usize,
    /// Terms with no dictionary match
    pub unresolved: usize,
    /// Headwords without usable pronunciation data
    pub no_pronunciation: usize,
    /// Terms skipped after a resolve error
    pub failed: usize,
    /// Elapsed time in seconds
    pub elapsed_seconds: f64,
    /// Looked-up terms per second
    pub terms_per_second: f64,
}

impl WriteStats {
    /// Update the processing rate
    pub fn update_rate(&mut self) {
        let looked_up = self.terms_visited - self.skipped_by_offset;
        if self.elapsed_seconds > 0.0 {
            self.terms_per_second = looked_up as f64 / self.elapsed_seconds;
        }
    }

    /// Print summary to console
    pub fn print_summary(&self, source: &str) {
        println!("\nRun Summary: {}", source);
        println!("==============");
        println!("Terms total:        {}", self.terms_total);
        println!("Terms visited:      {}", self.terms_visited);
        println!("Skipped by offset:  {}", self.skipped_by_offset);
        println!("Terms written:      {}", self.terms_written);
        println!("Records written:    {}", self.records_written);
        println!("Unresolved:         {}", self.unresolved);
        println!("No pronunciation:   {}", self.no_pronunciation);
        println!("Failed:             {}", self.failed);
        println!("Elapsed time:       {:.1}s", self.elapsed_seconds);
        println!("Lookup rate:        {:.2} terms/s", self.terms_per_second);
    }
}

/// Writes resolved pronunciations for a candidate set into one sink
pub struct BatchWriter<'r, C> {
    resolver: &'r Resolver<C>,
    source: String,
    sink: PathBuf,
    checkpoint_path: Option<PathBuf>,
    checkpoint_interval: usize,
    quiet: bool,
}

impl<'r, C: WebClient> BatchWriter<'r, C> {
    /// Create a writer for `sink`, checkpointing beside it
    pub fn new(resolver: &'r Resolver<C>, source: impl Into<String>, sink: impl AsRef<Path>) -> Self {
        let sink = sink.as_ref().to_path_buf();
        Self {
            resolver,
            source: source.into(),
            checkpoint_path: Some(checkpoint_path(&sink)),
            sink,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            quiet: true,
        }
    }

    /// Set the number of terms between durable flushes
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Override or disable the checkpoint file
    pub fn with_checkpoint_path(mut self, path: Option<PathBuf>) -> Self {
        self.checkpoint_path = path;
        self
    }

    /// Set quiet mode (no progress bar)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Resolve `terms` in order and write their records to the sink.
    ///
    /// Per-term resolve failures are logged and skipped; only sink and
    /// checkpoint failures abort the run.
    pub async fn write(
        &self,
        terms: &BTreeSet<String>,
        options: WriteOptions,
    ) -> Result<WriteStats, BatchError> {
        info!(
            "Writing {} terms from '{}' to {} (skip {}, max {:?}, {:?})",
            terms.len(),
            self.source,
            self.sink.display(),
            options.skip,
            options.max_count,
            options.mode
        );

        let (mut sink, mut written_labels) = self.open_sink(options.mode)?;
        let progress = BatchProgress::new(terms.len(), self.quiet);
        let mut next_index = options.skip.min(terms.len());

        let sink_len = sink.flush_durable()?;
        self.save_checkpoint(next_index, sink_len, &progress, &options)?;

        for (i, term) in terms.iter().enumerate() {
            if i < options.skip {
                progress.term_skipped();
                next_index = i + 1;
                continue;
            }

            if let Some(max) = options.max_count {
                if progress.written() >= max {
                    info!("Reached max count: {}", max);
                    break;
                }
            }

            let started = Instant::now();
            let outcome = self.process_term(term, &mut sink, &mut written_labels).await?;
            progress.term_finished(term, outcome, started.elapsed());
            next_index = i + 1;

            if next_index % self.checkpoint_interval == 0 {
                let sink_len = sink.flush_durable()?;
                progress.checkpoint(next_index);
                self.save_checkpoint(next_index, sink_len, &progress, &options)?;
            }
        }

        let sink_len = sink.finish()?;
        self.save_checkpoint(next_index, sink_len, &progress, &options)?;
        progress.finish();

        let stats = progress.get_stats();
        info!(
            "Finished '{}': {} terms written, {} records, {} unresolved, {} failed",
            self.source, stats.terms_written, stats.records_written, stats.unresolved, stats.failed
        );
        Ok(stats)
    }

    fn open_sink(&self, mode: SinkMode) -> Result<(SinkWriter, HashSet<String>), BatchError> {
        match mode {
            SinkMode::Truncate => Ok((SinkWriter::create(&self.sink)?, HashSet::new())),
            SinkMode::Append { truncate_to } => {
                let writer = SinkWriter::append(&self.sink, truncate_to)?;
                let labels = sink::load_ignore(&self.sink)?;
                debug!("Retained {} labels in {}", labels.len(), self.sink.display());
                Ok((writer, labels))
            }
        }
    }

    async fn process_term(
        &self,
        term: &str,
        sink: &mut SinkWriter,
        written_labels: &mut HashSet<String>,
    ) -> Result<TermOutcome, BatchError> {
        let headword = match self.resolver.search(term).await {
            Ok(Some(headword)) => headword,
            Ok(None) => {
                info!("'{}' unresolved", term);
                return Ok(TermOutcome::Unresolved);
            }
            Err(e) => {
                warn!(reason = e.reason_class(), "Skipping '{}': {}", term, e);
                return Ok(TermOutcome::Failed);
            }
        };

        let groups = match self.resolver.fetch_pronunciations(&headword).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(reason = e.reason_class(), "Skipping '{}' ({}): {}", term, headword, e);
                return Ok(TermOutcome::Failed);
            }
        };

        if groups.is_empty() {
            info!("'{}' ({}) has no pronunciation data", term, headword);
            return Ok(TermOutcome::NoPronunciation);
        }

        let mut records = 0;
        for group in groups {
            let record = match ResultRecord::try_from(group) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Dropping record for '{}' ({}): {}", term, headword, e);
                    continue;
                }
            };
            if written_labels.contains(&record.label) {
                warn!("Label '{}' already written, dropping duplicate from '{}'", record.label, term);
                continue;
            }
            sink.write_record(&record)?;
            debug!("{} -> {}", term, record.to_line());
            written_labels.insert(record.label);
            records += 1;
        }

        Ok(TermOutcome::Written { records })
    }

    fn save_checkpoint(
        &self,
        next_index: usize,
        sink_len: u64,
        progress: &BatchProgress,
        options: &WriteOptions,
    ) -> Result<(), BatchError> {
        if let Some(ref path) = self.checkpoint_path {
            RunCheckpoint::new(
                self.source.clone(),
                self.sink.clone(),
                next_index,
                sink_len,
                options.carried_terms + progress.written(),
                options.carried_records + progress.records(),
            )
            .with_own_sink_prefix(options.own_sink_prefix)
            .save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::mock::{pages, MockResponse, MockWebClient};
    use crate::resolver::{Endpoints, FetchError, RetryPolicy};
    use crate::types::Headword;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    /// Loads the checkpoint on disk when the first lookup is made
    struct CheckpointAtFirstLookup<'a> {
        inner: &'a MockWebClient,
        path: PathBuf,
        seen: Mutex<Option<RunCheckpoint>>,
    }

    #[async_trait]
    impl WebClient for CheckpointAtFirstLookup<'_> {
        async fn get(&self, url: &Url) -> Result<String, FetchError> {
            {
                let mut seen = self.seen.lock().unwrap();
                if seen.is_none() {
                    *seen = Some(RunCheckpoint::load(&self.path).unwrap());
                }
            }
            self.inner.get(url).await
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::parse("https://dict.test").unwrap()
    }

    fn resolver(client: &MockWebClient) -> Resolver<&MockWebClient> {
        Resolver::new(client, endpoints(), RetryPolicy::new(3, Duration::ZERO))
    }

    /// Script a term that resolves to `headword` with a single U.S. IPA
    fn script(client: &MockWebClient, term: &str, headword: &str, ipa: &str) {
        let e = endpoints();
        client.page(&e.search_url(term).unwrap(), pages::search_result(&[headword]));
        let entry = format!("U.S.: /{}/", ipa);
        client.page(
            &e.pronunciation_url(&Headword::new(headword)).unwrap(),
            pages::pronunciations(&[(None, &[entry.as_str()])]),
        );
    }

    fn terms(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn labels(path: &Path) -> Vec<String> {
        sink::read_records(path)
            .unwrap()
            .into_iter()
            .map(|r| r.label)
            .collect()
    }

    fn scripted_client() -> MockWebClient {
        let client = MockWebClient::new();
        script(&client, "cyst", "cyst_n", "sɪst");
        script(&client, "lobe", "lobe_n", "loʊb");
        script(&client, "mass", "mass_n1", "mæs");
        script(&client, "node", "node_n", "noʊd");
        client
    }

    #[tokio::test]
    async fn test_writes_in_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(&terms(&["node", "cyst", "mass", "lobe"]), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(labels(&sink_path), vec!["cyst", "lobe", "mass", "node"]);
        assert_eq!(stats.terms_written, 4);
        assert_eq!(stats.records_written, 4);
    }

    #[tokio::test]
    async fn test_fresh_runs_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);
        let writer = BatchWriter::new(&resolver, "test", &sink_path);
        let set = terms(&["cyst", "lobe", "mass", "node"]);

        writer.write(&set, WriteOptions::default()).await.unwrap();
        let first = std::fs::read(&sink_path).unwrap();
        writer.write(&set, WriteOptions::default()).await.unwrap();
        let second = std::fs::read(&sink_path).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_skip_offset_does_not_resolve_leading_terms() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(
                &terms(&["cyst", "lobe", "mass", "node"]),
                WriteOptions {
                    skip: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(labels(&sink_path), vec!["mass", "node"]);
        assert_eq!(stats.skipped_by_offset, 2);
        assert_eq!(stats.terms_visited, 4);
        assert_eq!(client.call_count(&endpoints().search_url("cyst").unwrap()), 0);
        assert_eq!(client.call_count(&endpoints().search_url("lobe").unwrap()), 0);
    }

    #[tokio::test]
    async fn test_max_count_bounds_written_terms() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(
                &terms(&["cyst", "lobe", "mass", "node"]),
                WriteOptions {
                    max_count: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.terms_written, 2);
        assert_eq!(labels(&sink_path), vec!["cyst", "lobe"]);
        assert_eq!(client.call_count(&endpoints().search_url("mass").unwrap()), 0);

        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();
        assert_eq!(checkpoint.next_index, 2);
    }

    #[tokio::test]
    async fn test_failed_term_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let failing = endpoints().search_url("lobe").unwrap();
        client.route(&failing, vec![MockResponse::Timeout]);
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(&terms(&["cyst", "lobe", "mass"]), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(client.call_count(&failing), 3);
        assert_eq!(labels(&sink_path), vec!["cyst", "mass"]);
    }

    #[tokio::test]
    async fn test_unresolved_and_empty_terms_write_nothing() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let e = endpoints();
        client.page(&e.search_url("qwxz").unwrap(), pages::no_results());
        client.page(&e.search_url("the").unwrap(), pages::search_result(&["the_art"]));
        client.page(
            &e.pronunciation_url(&Headword::new("the_art")).unwrap(),
            "<html><body><p>No pronunciation</p></body></html>",
        );
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(&terms(&["mass", "qwxz", "the"]), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.no_pronunciation, 1);
        assert_eq!(labels(&sink_path), vec!["mass"]);
    }

    #[tokio::test]
    async fn test_duplicate_label_written_once() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = MockWebClient::new();
        script(&client, "masses", "mass_n1", "mæs");
        script(&client, "mass", "mass_n1", "mæs");
        let resolver = resolver(&client);

        let stats = BatchWriter::new(&resolver, "test", &sink_path)
            .write(&terms(&["mass", "masses"]), WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(labels(&sink_path), vec!["mass"]);
        assert_eq!(stats.records_written, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_every_interval() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);

        BatchWriter::new(&resolver, "core", &sink_path)
            .with_checkpoint_interval(2)
            .write(&terms(&["cyst", "lobe", "mass"]), WriteOptions::default())
            .await
            .unwrap();

        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();
        assert_eq!(checkpoint.source, "core");
        assert_eq!(checkpoint.next_index, 3);
        assert_eq!(checkpoint.terms_written, 3);
        assert_eq!(checkpoint.sink_len, std::fs::metadata(&sink_path).unwrap().len());
    }

    #[tokio::test]
    async fn test_resume_discards_unflushed_tail() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);
        let writer = BatchWriter::new(&resolver, "test", &sink_path);
        let set = terms(&["cyst", "lobe", "mass", "node"]);

        writer
            .write(&set, WriteOptions { max_count: Some(2), ..Default::default() })
            .await
            .unwrap();
        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();

        // a record written after the last durable flush
        let mut tail = SinkWriter::append(&sink_path, None).unwrap();
        tail.write_record(&ResultRecord::new("partial", "x").unwrap()).unwrap();
        tail.finish().unwrap();

        writer
            .write(&set, WriteOptions::resume_from(&checkpoint))
            .await
            .unwrap();

        assert_eq!(labels(&sink_path), vec!["cyst", "lobe", "mass", "node"]);

        let resumed = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();
        assert_eq!(resumed.next_index, 4);
        assert_eq!(resumed.terms_written, 4);
        assert_eq!(resumed.records_written, 4);
    }

    #[tokio::test]
    async fn test_fresh_run_replaces_earlier_checkpoint_before_lookups() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let checkpoint_file = checkpoint_path(&sink_path);
        let client = scripted_client();
        let set = terms(&["cyst", "lobe", "mass", "node"]);

        let plain = resolver(&client);
        BatchWriter::new(&plain, "test", &sink_path)
            .write(&set, WriteOptions { max_count: Some(2), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(RunCheckpoint::load(&checkpoint_file).unwrap().next_index, 2);

        let watching = CheckpointAtFirstLookup {
            inner: &client,
            path: checkpoint_file.clone(),
            seen: Mutex::new(None),
        };
        let resolver = Resolver::new(&watching, endpoints(), RetryPolicy::new(3, Duration::ZERO));
        BatchWriter::new(&resolver, "test", &sink_path)
            .write(&set, WriteOptions::default())
            .await
            .unwrap();

        let at_start = watching.seen.lock().unwrap().clone().unwrap();
        assert_eq!(at_start.next_index, 0);
        assert_eq!(at_start.sink_len, 2);
        assert_eq!(at_start.terms_written, 0);
    }

    #[tokio::test]
    async fn test_resume_refuses_checkpoint_inside_a_record() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        let client = scripted_client();
        let resolver = resolver(&client);
        let writer = BatchWriter::new(&resolver, "test", &sink_path);
        let set = terms(&["cyst", "lobe", "mass", "node"]);

        writer
            .write(&set, WriteOptions { max_count: Some(1), ..Default::default() })
            .await
            .unwrap();
        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();

        // sink rewritten by a run that stopped before saving any checkpoint
        let mut other = SinkWriter::create(&sink_path).unwrap();
        other
            .write_record(&ResultRecord::new("hepatocellular", "hɛpətoʊ").unwrap())
            .unwrap();
        other.finish().unwrap();
        let before = std::fs::read(&sink_path).unwrap();

        let result = writer.write(&set, WriteOptions::resume_from(&checkpoint)).await;

        assert!(matches!(
            result,
            Err(BatchError::Sink(SinkError::Malformed { .. }))
        ));
        assert_eq!(std::fs::read(&sink_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_append_mode_keeps_existing_labels_unique() {
        let dir = TempDir::new().unwrap();
        let sink_path = dir.path().join("out.txt");
        sink::write_records(&sink_path, [&ResultRecord::new("mass", "mæs").unwrap()]).unwrap();
        let client = scripted_client();
        let resolver = resolver(&client);

        BatchWriter::new(&resolver, "test", &sink_path)
            .write(
                &terms(&["lobe", "mass"]),
                WriteOptions {
                    mode: SinkMode::Append { truncate_to: None },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(labels(&sink_path), vec!["mass", "lobe"]);
    }
}
