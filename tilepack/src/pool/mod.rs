//! Worker pool scheduler for tile downloads.
//!
//! [`DownloadPool::run`] turns a flat list of tile coordinates into a
//! [`RunSummary`]:
//!
//! - at most `concurrency` fetches are in flight at once (semaphore permits;
//!   a completion immediately frees a slot for the next queued tile);
//! - a [`SubmissionPacer`] inserts a delay between tiles handed to the pool,
//!   an independent throttle that keeps the aggregate request rate low even
//!   if the concurrency cap were raised;
//! - completions stream unordered to the [`ProgressAggregator`];
//! - tiles are independent: one failure never cancels or blocks another;
//! - cancelling the token stops submission, while in-flight fetches drain
//!   naturally (bounded by the request timeout) and still get tallied.

pub mod pacing;

pub use pacing::{FixedIntervalPacer, NoPacing, SubmissionPacer, DEFAULT_SUBMISSION_DELAY};

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coord::TileCoord;
use crate::fetch::{TileFetcher, TileHttpClient};
use crate::progress::{ProgressAggregator, ProgressEvent, RunSummary, DEFAULT_REPORT_INTERVAL};

/// Default number of fetches in flight.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Bounded worker pool over a shared [`TileFetcher`].
pub struct DownloadPool<C: TileHttpClient> {
    fetcher: Arc<TileFetcher<C>>,
    pacer: Arc<dyn SubmissionPacer>,
    concurrency: usize,
    report_interval: usize,
}

impl<C: TileHttpClient> DownloadPool<C> {
    /// Creates a pool.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared fetcher; each worker invokes it independently
    /// * `pacer` - Submission-rate throttle
    /// * `concurrency` - In-flight cap (clamped to at least 1)
    pub fn new(
        fetcher: Arc<TileFetcher<C>>,
        pacer: Arc<dyn SubmissionPacer>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            pacer,
            concurrency: concurrency.max(1),
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    /// Sets the number of completions between progress snapshots.
    pub fn with_report_interval(mut self, interval: usize) -> Self {
        self.report_interval = interval;
        self
    }

    /// Runs the pool over `tiles` until every submitted tile has resolved.
    ///
    /// Progress events go to `events` if provided; the returned summary is
    /// produced either way. Cancellation stops submission of new tiles and
    /// lets in-flight fetches finish.
    pub async fn run(
        &self,
        tiles: Vec<TileCoord>,
        events: Option<mpsc::Sender<ProgressEvent>>,
        cancel: CancellationToken,
    ) -> RunSummary {
        let total = tiles.len();
        info!(total, concurrency = self.concurrency, "starting download run");

        let (completion_tx, completion_rx) = mpsc::channel(self.concurrency * 2);
        let aggregator = ProgressAggregator::new(total, self.report_interval, events);

        let submit = async {
            let semaphore = Arc::new(Semaphore::new(self.concurrency));
            let mut workers = Vec::new();
            let mut submitted = 0usize;

            for tile in tiles {
                let permit = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let fetcher = Arc::clone(&self.fetcher);
                let tx = completion_tx.clone();
                workers.push(tokio::spawn(async move {
                    let outcome = fetcher.fetch(tile).await;
                    // The aggregator holds the receiver until all senders drop
                    let _ = tx.send((tile, outcome)).await;
                    drop(permit);
                }));
                submitted += 1;

                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    _ = self.pacer.pause() => {}
                }
            }

            if cancel.is_cancelled() {
                info!(submitted, total, "cancelled, no further tiles submitted");
            }
            debug!(submitted, "submission finished, draining in-flight fetches");

            // Close our side of the channel; the aggregator finishes once
            // the last worker has reported.
            drop(completion_tx);

            futures::future::join_all(workers).await;
        };

        let ((), summary) = tokio::join!(submit, aggregator.run(completion_rx, cancel.clone()));
        summary
    }
}
