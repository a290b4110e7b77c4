//! Run orchestration across configured sources
//!
//! The pipeline owns the one web client of a run (inside its `Resolver`)
//! and drives each source through convert, extract, ignore and write. The
//! ignore set of a source is the union of the sinks of every source declared
//! before it, so a term already resolved for an earlier source is not looked
//! up again. An incremental run also ignores the labels its own sink held
//! when the run started; the length of that prefix is kept in the checkpoint
//! so a resumed run rebuilds the same candidate set.

use crate::batch::{checkpoint_path, BatchWriter, RunCheckpoint, SinkMode, WriteOptions, WriteStats};
use crate::config::{Config, SourceConfig};
use crate::content;
use crate::extract::extract_terms;
use crate::resolver::{Endpoints, HttpWebClient, Resolver, WebClient};
use crate::sink::{self, MergeStats};
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Options for a single-source run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Leading terms to pass over without resolving
    pub skip: usize,
    /// Stop after this many written terms
    pub max_count: Option<usize>,
    /// Continue from the source's checkpoint
    pub resume: bool,
    /// Drop terms already in the source's own sink and append to it
    pub incremental: bool,
}

/// Outcome of `run_all`
#[derive(Debug, Default)]
pub struct RunAllReport {
    pub completed: Vec<(String, WriteStats)>,
    pub failed: Vec<(String, String)>,
    pub merge: Option<MergeStats>,
}

/// Drives sources through the resolver
pub struct Pipeline<C> {
    config: Config,
    resolver: Resolver<C>,
    quiet: bool,
}

impl Pipeline<HttpWebClient> {
    /// Build a pipeline with a live HTTP client
    pub fn connect(config: Config) -> Result<Self> {
        let client = HttpWebClient::new(config.http.fetch_config())
            .context("Failed to create HTTP client")?;
        Self::new(config, client)
    }
}

impl<C: WebClient> Pipeline<C> {
    /// Build a pipeline around an existing client
    pub fn new(config: Config, client: C) -> Result<Self> {
        let endpoints = Endpoints::parse(&config.http.base_url)?;
        let resolver = Resolver::new(client, endpoints, config.resolver.retry_policy())
            .with_max_correction_hops(config.resolver.max_correction_hops);

        Ok(Self {
            config,
            resolver,
            quiet: false,
        })
    }

    /// Set quiet mode (no progress bars)
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    /// Candidate set for a source; see [`extract`]
    pub fn extract(&self, name: &str, own_sink_prefix: Option<u64>) -> Result<BTreeSet<String>> {
        extract(&self.config, name, own_sink_prefix)
    }

    /// Resolve one source into its sink
    pub async fn run_source(&self, name: &str, options: RunOptions) -> Result<WriteStats> {
        if options.resume && options.incremental {
            anyhow::bail!("--resume and --incremental cannot be combined");
        }

        let source = self.config.source(name)?;
        let write_options = self.write_options(source, &options)?;
        let terms = extract(&self.config, name, write_options.own_sink_prefix)?;

        let stats = BatchWriter::new(&self.resolver, name, &source.sink)
            .with_checkpoint_interval(self.config.batch.checkpoint_interval)
            .with_quiet(self.quiet)
            .write(&terms, write_options)
            .await
            .with_context(|| format!("Run for source '{}' aborted", name))?;

        Ok(stats)
    }

    fn write_options(&self, source: &SourceConfig, options: &RunOptions) -> Result<WriteOptions> {
        if options.resume {
            let path = checkpoint_path(&source.sink);
            let checkpoint = RunCheckpoint::load_if_exists(&path)?.with_context(|| {
                format!("No checkpoint for source '{}' at {}", source.name, path.display())
            })?;
            if checkpoint.source != source.name {
                anyhow::bail!(
                    "Checkpoint {} belongs to source '{}', not '{}'",
                    path.display(),
                    checkpoint.source,
                    source.name
                );
            }
            info!(
                "Resuming '{}' at term {} ({} terms written at {}{})",
                source.name,
                checkpoint.next_index,
                checkpoint.terms_written,
                checkpoint.timestamp,
                if checkpoint.own_sink_prefix.is_some() { ", incremental" } else { "" }
            );
            return Ok(WriteOptions {
                max_count: options.max_count,
                ..WriteOptions::resume_from(&checkpoint)
            });
        }

        let (mode, own_sink_prefix) = if options.incremental {
            let len = match std::fs::metadata(&source.sink) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to read {}", source.sink.display()));
                }
            };
            (SinkMode::Append { truncate_to: None }, Some(len))
        } else {
            (SinkMode::Truncate, None)
        };

        Ok(WriteOptions {
            skip: options.skip,
            max_count: options.max_count,
            mode,
            own_sink_prefix,
            ..Default::default()
        })
    }

    /// Run every source in declaration order, then merge.
    ///
    /// A failing source is logged and the remaining sources still run. Only
    /// sinks that exist are merged.
    pub async fn run_all(&self) -> Result<RunAllReport> {
        let mut report = RunAllReport::default();

        for source in &self.config.sources {
            match self.run_source(&source.name, RunOptions::default()).await {
                Ok(stats) => report.completed.push((source.name.clone(), stats)),
                Err(e) => {
                    error!("Source '{}' failed: {:#}", source.name, e);
                    report.failed.push((source.name.clone(), format!("{:#}", e)));
                }
            }
        }

        let sinks: Vec<PathBuf> = self
            .config
            .sink_paths()
            .into_iter()
            .filter(|sink| {
                let exists = sink.exists();
                if !exists {
                    warn!("Leaving missing sink {} out of the merge", sink.display());
                }
                exists
            })
            .collect();

        let destination = self.config.output.merged.clone();
        report.merge = Some(merge_sinks(&sinks, &destination)?);
        Ok(report)
    }
}

/// Build (or rebuild with `force`) a source's text cache and return its text
pub fn convert(config: &Config, name: &str, force: bool) -> Result<String> {
    let source = config.source(name)?;
    content::load_source_text(&source.document, source.text_cache.as_deref(), force)
        .with_context(|| format!("Failed to load text for source '{}'", name))
}

/// Labels that must not be looked up again for `name`: the sinks of every
/// earlier source, plus the labels in the first `own_sink_prefix` bytes of
/// its own sink when that is set
pub fn ignore_set(config: &Config, name: &str, own_sink_prefix: Option<u64>) -> Result<HashSet<String>> {
    let index = config
        .source_index(name)
        .with_context(|| format!("Unknown source '{}'", name))?;

    let mut ignore = HashSet::new();
    for source in &config.sources[..index] {
        let labels = sink::load_ignore(&source.sink)
            .with_context(|| format!("Failed to load ignore set from {}", source.sink.display()))?;
        info!("Ignoring {} labels from '{}'", labels.len(), source.name);
        ignore.extend(labels);
    }

    if let Some(len) = own_sink_prefix {
        let own = &config.sources[index];
        let labels = sink::load_ignore_prefix(&own.sink, len)
            .with_context(|| format!("Failed to load ignore set from {}", own.sink.display()))?;
        info!("Ignoring {} labels already in '{}'", labels.len(), own.name);
        ignore.extend(labels);
    }

    Ok(ignore)
}

/// Extract the candidate set of a source after removing ignored labels
pub fn extract(config: &Config, name: &str, own_sink_prefix: Option<u64>) -> Result<BTreeSet<String>> {
    let source = config.source(name)?;
    let policy = config
        .policy(&source.policy)
        .with_context(|| format!("Unknown cleanup policy '{}'", source.policy))?
        .compile(&source.policy)?;

    let text = convert(config, name, false)?;
    let ignore = ignore_set(config, name, own_sink_prefix)?;
    let terms = extract_terms(&text, source.index_line, &policy, &ignore);

    info!("Extracted {} candidate terms from '{}'", terms.len(), name);
    Ok(terms)
}

/// Merge every configured sink into `destination` (or the configured output)
pub fn merge(config: &Config, destination: Option<&Path>) -> Result<MergeStats> {
    let destination = destination.unwrap_or(&config.output.merged);
    merge_sinks(&config.sink_paths(), destination)
}

fn merge_sinks(sinks: &[PathBuf], destination: &Path) -> Result<MergeStats> {
    sink::merge(sinks, destination)
        .with_context(|| format!("Failed to merge into {}", destination.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::extract::WORD_LIST;
    use crate::resolver::mock::{pages, MockWebClient};
    use crate::types::{Headword, ResultRecord};
    use tempfile::TempDir;

    fn word_source(dir: &Path, name: &str, words: &str) -> SourceConfig {
        let document = dir.join(format!("{}.txt", name));
        std::fs::write(&document, words).unwrap();
        SourceConfig {
            name: name.to_string(),
            document,
            text_cache: None,
            sink: dir.join("out").join(format!("_out_{}.txt", name)),
            index_line: 1,
            policy: WORD_LIST.to_string(),
        }
    }

    fn config(dir: &Path, sources: Vec<SourceConfig>) -> Config {
        let mut config = Config::default();
        config.http.base_url = "https://dict.test".to_string();
        config.resolver.retry_delay_secs = 0;
        config.sources = sources;
        config.output.merged = dir.join("out").join("lexicon.txt");
        config
    }

    fn script(client: &MockWebClient, term: &str, ipa: &str) {
        let endpoints = Endpoints::parse("https://dict.test").unwrap();
        let headword = Headword::new(format!("{}_n", term));
        client.page(
            &endpoints.search_url(term).unwrap(),
            pages::search_result(&[headword.as_str()]),
        );
        let entry = format!("U.S.: /{}/", ipa);
        client.page(
            &endpoints.pronunciation_url(&headword).unwrap(),
            pages::pronunciations(&[(None, &[entry.as_str()])]),
        );
    }

    #[tokio::test]
    async fn test_earlier_sinks_are_ignored() {
        let dir = TempDir::new().unwrap();
        let first = word_source(dir.path(), "first", "cat\ndog\n");
        let second = word_source(dir.path(), "second", "dog\neel\n");
        let client = MockWebClient::new();
        script(&client, "cat", "kæt");
        script(&client, "dog", "dɔg");
        script(&client, "eel", "il");

        let pipeline = Pipeline::new(config(dir.path(), vec![first, second]), &client)
            .unwrap()
            .with_quiet(true);
        pipeline.run_source("first", RunOptions::default()).await.unwrap();

        let terms = pipeline.extract("second", None).unwrap();
        assert_eq!(terms.into_iter().collect::<Vec<_>>(), vec!["eel"]);
        assert!(ignore_set(pipeline.config(), "first", None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incremental_skips_own_labels() {
        let dir = TempDir::new().unwrap();
        let source = word_source(dir.path(), "words", "cat\ndog\n");
        let sink_path = source.sink.clone();
        sink::write_records(&sink_path, [&ResultRecord::new("cat", "kæt").unwrap()]).unwrap();
        let client = MockWebClient::new();
        script(&client, "dog", "dɔg");

        let pipeline = Pipeline::new(config(dir.path(), vec![source]), &client)
            .unwrap()
            .with_quiet(true);
        let stats = pipeline
            .run_source(
                "words",
                RunOptions {
                    incremental: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.terms_total, 1);
        let labels: Vec<String> = sink::read_records(&sink_path)
            .unwrap()
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec!["cat", "dog"]);
        assert!(client.calls().iter().all(|url| !url.contains("q=cat")));
    }

    #[tokio::test]
    async fn test_resumed_incremental_run_continues_where_it_stopped() {
        let dir = TempDir::new().unwrap();
        let source = word_source(dir.path(), "words", "apple\nbanana\ncherry\ndate\nelder\n");
        let sink_path = source.sink.clone();
        sink::write_records(
            &sink_path,
            [
                &ResultRecord::new("apple", "æpəl").unwrap(),
                &ResultRecord::new("banana", "bənænə").unwrap(),
            ],
        )
        .unwrap();
        let client = MockWebClient::new();
        for word in ["apple", "banana", "cherry", "date", "elder"] {
            script(&client, word, word);
        }

        let pipeline = Pipeline::new(config(dir.path(), vec![source]), &client)
            .unwrap()
            .with_quiet(true);
        pipeline
            .run_source(
                "words",
                RunOptions {
                    incremental: true,
                    max_count: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let stats = pipeline
            .run_source(
                "words",
                RunOptions {
                    resume: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let endpoints = Endpoints::parse("https://dict.test").unwrap();
        let searches = |word: &str| client.call_count(&endpoints.search_url(word).unwrap());
        assert_eq!(searches("apple"), 0);
        assert_eq!(searches("banana"), 0);
        assert_eq!(searches("cherry"), 1);
        assert_eq!(searches("date"), 1);
        assert_eq!(searches("elder"), 1);

        assert_eq!(stats.terms_total, 3);
        assert_eq!(stats.skipped_by_offset, 1);
        let labels: Vec<String> = sink::read_records(&sink_path)
            .unwrap()
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec!["apple", "banana", "cherry", "date", "elder"]);

        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();
        assert_eq!(checkpoint.terms_written, 3);
        assert!(checkpoint.own_sink_prefix.is_some());
    }

    #[tokio::test]
    async fn test_fresh_run_clears_incremental_prefix() {
        let dir = TempDir::new().unwrap();
        let source = word_source(dir.path(), "words", "cat\ndog\n");
        let sink_path = source.sink.clone();
        let client = MockWebClient::new();
        script(&client, "cat", "kæt");
        script(&client, "dog", "dɔg");

        let pipeline = Pipeline::new(config(dir.path(), vec![source]), &client)
            .unwrap()
            .with_quiet(true);
        let incremental = RunOptions {
            incremental: true,
            ..Default::default()
        };
        pipeline.run_source("words", incremental).await.unwrap();
        assert_eq!(
            RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap().own_sink_prefix,
            Some(0)
        );

        pipeline.run_source("words", RunOptions::default()).await.unwrap();
        let checkpoint = RunCheckpoint::load(&checkpoint_path(&sink_path)).unwrap();
        assert_eq!(checkpoint.own_sink_prefix, None);
        assert_eq!(checkpoint.terms_written, 2);
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_fails() {
        let dir = TempDir::new().unwrap();
        let source = word_source(dir.path(), "words", "cat\n");
        let client = MockWebClient::new();
        let pipeline = Pipeline::new(config(dir.path(), vec![source]), &client).unwrap();

        let err = pipeline
            .run_source(
                "words",
                RunOptions {
                    resume: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No checkpoint"));
    }

    #[tokio::test]
    async fn test_run_all_continues_past_failing_source() {
        let dir = TempDir::new().unwrap();
        let first = word_source(dir.path(), "first", "cat\n");
        let mut broken = word_source(dir.path(), "broken", "dog\n");
        broken.document = dir.path().join("missing.pdf");
        let third = word_source(dir.path(), "third", "eel\n");
        let client = MockWebClient::new();
        script(&client, "cat", "kæt");
        script(&client, "eel", "il");

        let cfg = config(dir.path(), vec![first, broken, third]);
        let merged = cfg.output.merged.clone();
        let pipeline = Pipeline::new(cfg, &client).unwrap().with_quiet(true);
        let report = pipeline.run_all().await.unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        let merge = report.merge.unwrap();
        assert_eq!(merge.unique_written, 2);

        let labels: Vec<String> = sink::read_records(&merged)
            .unwrap()
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec!["cat", "eel"]);
    }

    #[test]
    fn test_unknown_source() {
        let dir = TempDir::new().unwrap();
        let cfg = config(dir.path(), vec![]);
        assert!(extract(&cfg, "nope", None).is_err());
        assert!(ignore_set(&cfg, "nope", None).is_err());
    }

    #[test]
    fn test_merge_reports_missing_sink() {
        let dir = TempDir::new().unwrap();
        let source = word_source(dir.path(), "words", "cat\n");
        let missing = source.sink.clone();
        let cfg = config(dir.path(), vec![source]);

        let err = merge(&cfg, None).unwrap_err();
        assert!(format!("{:#}", err).contains(&missing.display().to_string()));
    }
}
