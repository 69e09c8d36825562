//! Run tallying and progress reporting.
//!
//! The pool streams `(tile, outcome)` completions to a
//! [`ProgressAggregator`], which keeps lock-free counters in a [`RunTally`]
//! and emits [`ProgressEvent`]s over an optional channel: a snapshot every
//! [`DEFAULT_REPORT_INTERVAL`] completions (and on the last one), then a
//! final [`RunSummary`]. Consumers render the events however they like; the
//! library only produces them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::coord::TileCoord;
use crate::fetch::FetchOutcome;

/// Completions between progress snapshots.
pub const DEFAULT_REPORT_INTERVAL: usize = 50;

/// Lock-free outcome counters shared across completions.
#[derive(Debug, Default)]
pub struct RunTally {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    not_found: AtomicU64,
    failed: AtomicU64,
}

impl RunTally {
    /// Creates a zeroed tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome.
    pub fn record(&self, outcome: &FetchOutcome) {
        let counter = match outcome {
            FetchOutcome::Downloaded => &self.downloaded,
            FetchOutcome::Skipped => &self.skipped,
            FetchOutcome::NotFound => &self.not_found,
            FetchOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a [`RunTally`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    /// Tiles fetched and persisted this run.
    pub downloaded: u64,
    /// Tiles whose artifact already existed.
    pub skipped: u64,
    /// Tiles the server has no data for.
    pub not_found: u64,
    /// Tiles that could not be obtained.
    pub failed: u64,
}

impl TallySnapshot {
    /// Total outcomes recorded.
    pub fn completed(&self) -> u64 {
        self.downloaded + self.skipped + self.not_found + self.failed
    }

    /// Skipped and not-found together, the way summaries display them.
    pub fn skipped_or_missing(&self) -> u64 {
        self.skipped + self.not_found
    }
}

/// Periodic progress snapshot.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Outcomes observed so far.
    pub completed: usize,
    /// Tiles submitted for the whole run.
    pub total: usize,
    /// Counter values at this point.
    pub tally: TallySnapshot,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completion percentage, 0..=100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Final accounting for a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Tiles planned for the run.
    pub total_planned: usize,
    /// Outcomes actually observed (less than planned if cancelled).
    pub completed: usize,
    /// Final counter values.
    pub tally: TallySnapshot,
    /// Total wall-clock time.
    pub elapsed: Duration,
    /// True if submission stopped early on cancellation.
    pub cancelled: bool,
}

/// Events delivered to the progress hook.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Periodic snapshot (every report interval, and on the final tile).
    Snapshot(ProgressSnapshot),
    /// The run finished; no further events follow.
    Finished(RunSummary),
}

/// Consumes the completion stream and produces tally, events, and summary.
pub struct ProgressAggregator {
    total: usize,
    report_interval: usize,
    tally: Arc<RunTally>,
    events: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressAggregator {
    /// Creates an aggregator for a run of `total` tiles.
    ///
    /// `events` is the optional progress hook; pass `None` to only keep the
    /// tally and logs.
    pub fn new(
        total: usize,
        report_interval: usize,
        events: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Self {
        Self {
            total,
            report_interval: report_interval.max(1),
            tally: Arc::new(RunTally::new()),
            events,
        }
    }

    /// Live view of the counters, updated as completions arrive.
    pub fn tally(&self) -> Arc<RunTally> {
        Arc::clone(&self.tally)
    }

    /// Consumes completions until the channel closes, then emits the final
    /// summary. `cancel` only flags the summary; draining continues until
    /// every in-flight fetch has reported.
    pub async fn run(
        self,
        mut completions: mpsc::Receiver<(TileCoord, FetchOutcome)>,
        cancel: CancellationToken,
    ) -> RunSummary {
        let started = Instant::now();
        let mut completed = 0usize;

        while let Some((tile, outcome)) = completions.recv().await {
            self.tally.record(&outcome);
            completed += 1;

            if let FetchOutcome::Failed(reason) = &outcome {
                warn!(%tile, %reason, "tile failed");
            }

            if completed % self.report_interval == 0 || completed == self.total {
                let snapshot = ProgressSnapshot {
                    completed,
                    total: self.total,
                    tally: self.tally.snapshot(),
                    elapsed: started.elapsed(),
                };
                info!(
                    completed,
                    total = self.total,
                    percent = format!("{:.1}", snapshot.percent()),
                    downloaded = snapshot.tally.downloaded,
                    skipped = snapshot.tally.skipped_or_missing(),
                    failed = snapshot.tally.failed,
                    "progress"
                );
                if let Some(events) = &self.events {
                    let _ = events.send(ProgressEvent::Snapshot(snapshot)).await;
                }
            }
        }

        let summary = RunSummary {
            total_planned: self.total,
            completed,
            tally: self.tally.snapshot(),
            elapsed: started.elapsed(),
            cancelled: cancel.is_cancelled(),
        };

        info!(
            downloaded = summary.tally.downloaded,
            skipped = summary.tally.skipped_or_missing(),
            failed = summary.tally.failed,
            elapsed_secs = format!("{:.1}", summary.elapsed.as_secs_f64()),
            cancelled = summary.cancelled,
            "run complete"
        );

        if let Some(events) = &self.events {
            let _ = events.send(ProgressEvent::Finished(summary.clone())).await;
        }

        summary
    }
}
