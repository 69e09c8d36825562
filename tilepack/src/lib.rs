//! Tilepack - offline map tile mirroring
//!
//! Tilepack expands configured geographic regions into Web Mercator tile
//! coordinates and downloads the covering tiles from a slippy-map tile server
//! into a local directory tree, for fully offline map use.
//!
//! The pipeline: regions → [`region`] enumeration (via [`coord`]) → a flat
//! tile list → the [`pool`] scheduler dispatches each coordinate to the
//! retrying [`fetch`] fetcher under a concurrency cap and a submission-rate
//! cap → completions stream into the [`progress`] aggregator. Artifacts are
//! existence-checked in the [`store`], so an interrupted run resumes where it
//! left off.
//!
//! # Example
//!
//! ```no_run
//! use tilepack::config::DownloadConfig;
//! use tilepack::job::{AutoConfirm, DownloadJob};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), tilepack::job::JobError> {
//! let job = DownloadJob::new(DownloadConfig::default())?;
//! let outcome = job
//!     .execute(&AutoConfirm, None, CancellationToken::new())
//!     .await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coord;
pub mod fetch;
pub mod job;
pub mod pool;
pub mod progress;
pub mod region;
pub mod store;
pub mod telemetry;

pub use config::DownloadConfig;
pub use coord::TileCoord;
pub use fetch::{FetchOutcome, TileFetcher};
pub use job::{DownloadJob, RunOutcome, RunPlan, StartGate};
pub use progress::{ProgressEvent, RunSummary};
pub use region::{BoundingBox, Region};
