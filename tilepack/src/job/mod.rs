//! Run assembly: plan, confirm, execute.
//!
//! [`DownloadJob`] turns a validated [`DownloadConfig`] into a [`RunPlan`]
//! (the per-region tile breakdown plus the flat submission list), passes the
//! plan through a [`StartGate`] before any network activity, then wires store,
//! client, fetcher, pacer, and pool together and runs to a [`RunSummary`].
//!
//! The gate is the injectable stand-in for the interactive "continue? (y/n)"
//! prompt: CLIs implement it with a terminal prompt, tests with
//! [`AutoConfirm`], [`DenyAll`], or a [`GateFn`] closure.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigError, DownloadConfig};
use crate::coord::{CoordError, TileCoord};
use crate::fetch::{FetchPolicy, ReqwestTileClient, TileFetcher, TileHttpClient, TransportError};
use crate::pool::{DownloadPool, FixedIntervalPacer};
use crate::progress::{ProgressEvent, RunSummary};
use crate::store::TileStore;

/// Errors that prevent a run from starting.
///
/// Per-tile failures are not errors; they live in the run's tally.
#[derive(Debug, Error)]
pub enum JobError {
    /// The configuration is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A region's bounds could not be mapped to tiles.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Client(#[from] TransportError),
}

/// One region × zoom entry of a plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Region name.
    pub region: String,
    /// Zoom level.
    pub zoom: u8,
    /// Tiles this entry contributes.
    pub tile_count: usize,
}

/// Everything a run will do, computed before any network activity.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Per-region/zoom breakdown, in submission order.
    pub entries: Vec<PlanEntry>,
    /// The flat tile list, concatenated per entry. Overlapping regions are
    /// not deduplicated; duplicates resolve as skips.
    pub tiles: Vec<TileCoord>,
}

impl RunPlan {
    /// Total tiles that will be submitted.
    pub fn total_tiles(&self) -> usize {
        self.tiles.len()
    }
}

/// Decides whether a planned run may start.
pub trait StartGate: Send + Sync {
    /// Returns `true` to start the run, `false` to decline it.
    fn confirm(&self, plan: &RunPlan) -> bool;
}

/// Gate that always starts. For non-interactive use.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

impl StartGate for AutoConfirm {
    fn confirm(&self, _plan: &RunPlan) -> bool {
        true
    }
}

/// Gate that always declines. For tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl StartGate for DenyAll {
    fn confirm(&self, _plan: &RunPlan) -> bool {
        false
    }
}

/// Gate backed by a decision function.
///
/// Wraps any `Fn(&RunPlan) -> bool`, e.g. a closure capping the tile count
/// a caller is willing to download.
pub struct GateFn<F>(pub F);

impl<F> StartGate for GateFn<F>
where
    F: Fn(&RunPlan) -> bool + Send + Sync,
{
    fn confirm(&self, plan: &RunPlan) -> bool {
        (self.0)(plan)
    }
}

/// How a gated execution ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run executed; per-tile results are in the summary.
    Completed(RunSummary),
    /// The gate declined; nothing was fetched.
    Declined,
}

/// A configured download job.
pub struct DownloadJob {
    config: DownloadConfig,
}

impl DownloadJob {
    /// Creates a job, validating the configuration up front.
    pub fn new(config: DownloadConfig) -> Result<Self, JobError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The job's configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Computes the run plan: every region expanded at every zoom level in
    /// range, concatenated in order.
    pub fn plan(&self) -> Result<RunPlan, JobError> {
        let mut entries = Vec::new();
        let mut tiles = Vec::new();

        for zoom in self.config.min_zoom..=self.config.max_zoom {
            for region in &self.config.regions {
                let region_tiles = region.tiles(zoom)?;
                entries.push(PlanEntry {
                    region: region.name.clone(),
                    zoom,
                    tile_count: region_tiles.len(),
                });
                tiles.extend(region_tiles);
            }
        }

        Ok(RunPlan { entries, tiles })
    }

    /// Plans, gates, and executes the job with the real HTTP client.
    ///
    /// # Arguments
    ///
    /// * `gate` - Confirmation hook consulted before any network activity
    /// * `events` - Optional progress hook
    /// * `cancel` - Stops submission when triggered; in-flight fetches drain
    pub async fn execute(
        &self,
        gate: &dyn StartGate,
        events: Option<mpsc::Sender<ProgressEvent>>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, JobError> {
        let client = ReqwestTileClient::new(self.config.request_timeout)?;
        self.execute_with_client(client, gate, events, cancel).await
    }

    /// Like [`DownloadJob::execute`] but with an injected HTTP client.
    pub async fn execute_with_client<C: TileHttpClient>(
        &self,
        client: C,
        gate: &dyn StartGate,
        events: Option<mpsc::Sender<ProgressEvent>>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, JobError> {
        let plan = self.plan()?;
        info!(
            regions = self.config.regions.len(),
            zoom_min = self.config.min_zoom,
            zoom_max = self.config.max_zoom,
            total_tiles = plan.total_tiles(),
            "run planned"
        );

        if !gate.confirm(&plan) {
            info!("run declined before start");
            return Ok(RunOutcome::Declined);
        }

        let store = TileStore::new(self.config.output_dir.clone());
        let fetcher = TileFetcher::new(
            client,
            store,
            self.config.server_template.clone(),
            FetchPolicy {
                max_attempts: self.config.max_attempts,
                backoff_base: self.config.backoff_base,
                transport_retry_delay: self.config.transport_retry_delay,
            },
        );
        let pacer = FixedIntervalPacer::new(self.config.submission_delay);
        let pool = DownloadPool::new(Arc::new(fetcher), Arc::new(pacer), self.config.concurrency)
            .with_report_interval(self.config.report_interval);

        let summary = pool.run(plan.tiles, events, cancel).await;
        Ok(RunOutcome::Completed(summary))
    }
}
