//! Progress tracking for batch runs

use super::WriteStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// How a single term ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermOutcome {
    /// Pronunciation groups were found; `records` were new and written
    Written { records: usize },
    /// Search found neither a headword nor a correction
    Unresolved,
    /// The headword had no usable pronunciation groups
    NoPronunciation,
    /// A resolve error was logged and the term skipped
    Failed,
}

/// Timing snapshot logged at each checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointReport {
    pub next_index: usize,
    pub total: usize,
    pub elapsed: Duration,
    /// Remaining time extrapolated from time per written term
    pub eta: Option<Duration>,
    /// Average wall time of one term lookup
    pub avg_latency: Option<Duration>,
}

/// Progress tracker for one writer run
pub struct BatchProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    total: usize,
    visited: AtomicUsize,
    skipped: AtomicUsize,
    written: AtomicUsize,
    records: AtomicUsize,
    unresolved: AtomicUsize,
    no_pronunciation: AtomicUsize,
    failed: AtomicUsize,
    /// Summed lookup time in microseconds
    lookup_micros: AtomicU64,
    lookups: AtomicUsize,
}

impl BatchProgress {
    /// Create a new progress tracker over `total` terms
    pub fn new(total: usize, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            total,
            visited: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            written: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
            unresolved: AtomicUsize::new(0),
            no_pronunciation: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            lookup_micros: AtomicU64::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Count a term passed over by the skip offset
    pub fn term_skipped(&self) {
        let visited = self.visited.fetch_add(1, Ordering::Relaxed) + 1;
        self.skipped.fetch_add(1, Ordering::Relaxed);
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(visited as u64);
        }
    }

    /// Record the outcome of a looked-up term
    pub fn term_finished(&self, term: &str, outcome: TermOutcome, latency: Duration) {
        let visited = self.visited.fetch_add(1, Ordering::Relaxed) + 1;
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.lookup_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        match outcome {
            TermOutcome::Written { records } => {
                self.written.fetch_add(1, Ordering::Relaxed);
                self.records.fetch_add(records, Ordering::Relaxed);
            }
            TermOutcome::Unresolved => {
                self.unresolved.fetch_add(1, Ordering::Relaxed);
            }
            TermOutcome::NoPronunciation => {
                self.no_pronunciation.fetch_add(1, Ordering::Relaxed);
            }
            TermOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(visited as u64);
            let display_term = if term.chars().count() > 30 {
                let truncated: String = term.chars().take(27).collect();
                format!("{}...", truncated)
            } else {
                term.to_string()
            };
            pb.set_message(format!(
                "{} written | {}",
                self.written.load(Ordering::Relaxed),
                display_term
            ));
        }
    }

    /// Terms written so far
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    /// Records written so far
    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }

    /// Build and log the timing report for a checkpoint at `next_index`
    pub fn checkpoint(&self, next_index: usize) -> CheckpointReport {
        let elapsed = self.start_time.elapsed();
        let written = self.written();
        let lookups = self.lookups.load(Ordering::Relaxed);

        let report = CheckpointReport {
            next_index,
            total: self.total,
            elapsed,
            eta: estimate_remaining(elapsed, written, self.total.saturating_sub(next_index)),
            avg_latency: (lookups > 0).then(|| {
                Duration::from_micros(self.lookup_micros.load(Ordering::Relaxed) / lookups as u64)
            }),
        };

        let message = format!(
            "Checkpoint {}/{}: {} written, elapsed {:.0}s, ETA {}, avg lookup {}",
            report.next_index,
            report.total,
            written,
            report.elapsed.as_secs_f64(),
            report
                .eta
                .map(|d| format!("{:.0}s", d.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string()),
            report
                .avg_latency
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "n/a".to_string()),
        );
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| info!("{}", message)),
            None => info!("{}", message),
        }

        report
    }

    /// Get current statistics
    pub fn get_stats(&self) -> WriteStats {
        let mut stats = WriteStats {
            terms_total: self.total,
            terms_visited: self.visited.load(Ordering::Relaxed),
            skipped_by_offset: self.skipped.load(Ordering::Relaxed),
            terms_written: self.written(),
            records_written: self.records(),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            no_pronunciation: self.no_pronunciation.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
            terms_per_second: 0.0,
        };
        stats.update_rate();
        stats
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.get_stats();
            pb.finish_with_message(format!(
                "Done! {} written, {} unresolved, {} errors",
                stats.terms_written, stats.unresolved, stats.failed
            ));
        }
    }
}

/// Extrapolate remaining time from the average time per written term
pub fn estimate_remaining(elapsed: Duration, written: usize, remaining: usize) -> Option<Duration> {
    if written == 0 {
        return None;
    }
    Some(elapsed.mul_f64(remaining as f64 / written as f64))
}
