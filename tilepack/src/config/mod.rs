//! Download job configuration.
//!
//! Everything the original tool kept as module-level constants is an explicit
//! value here, injected into the fetcher, pacer, and pool at construction.
//! Defaults match a polite OpenStreetMap mirror job; tests override the
//! delays with tiny values and swap the HTTP client for a mock.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::coord::{MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON};
use crate::fetch::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS, DEFAULT_TRANSPORT_RETRY_DELAY};
use crate::pool::{DEFAULT_CONCURRENCY, DEFAULT_SUBMISSION_DELAY};
use crate::progress::DEFAULT_REPORT_INTERVAL;
use crate::region::{BoundingBox, Region};

/// Default tile server URL template.
pub const DEFAULT_SERVER_TEMPLATE: &str = "https://tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default output directory for tile artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "tiles";

/// Default zoom level mirrored when no range is given.
pub const DEFAULT_ZOOM: u8 = 11;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the region file.
    #[error("failed to read region file {path}: {source}")]
    RegionFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The region file is not valid JSON for a region list.
    #[error("failed to parse region file {path}: {source}")]
    RegionFileParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// No regions configured.
    #[error("no regions configured")]
    NoRegions,

    /// A region's bounding box is unordered or outside the projectable world.
    #[error("region {name:?} has invalid bounds: {reason}")]
    InvalidBounds { name: String, reason: String },

    /// Zoom range is empty or exceeds the maximum.
    #[error("invalid zoom range {min}..={max} (maximum zoom is {MAX_ZOOM})")]
    InvalidZoomRange { min: u8, max: u8 },

    /// The URL template is missing a placeholder.
    #[error("server URL template missing {placeholder} placeholder: {template}")]
    BadServerTemplate {
        template: String,
        placeholder: &'static str,
    },
}

/// Full configuration surface for a download job.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Tile server URL with `{z}`, `{x}`, `{y}` placeholders.
    pub server_template: String,

    /// Root directory for tile artifacts.
    pub output_dir: PathBuf,

    /// Lowest zoom level to mirror.
    pub min_zoom: u8,

    /// Highest zoom level to mirror (inclusive).
    pub max_zoom: u8,

    /// Regions to cover.
    pub regions: Vec<Region>,

    /// Fetches in flight at once.
    pub concurrency: usize,

    /// Delay between tiles handed to the pool.
    pub submission_delay: Duration,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// Attempts per tile, initial try included.
    pub max_attempts: u32,

    /// Base delay for the linear rate-limit backoff.
    pub backoff_base: Duration,

    /// Delay before retrying a transport failure.
    pub transport_retry_delay: Duration,

    /// Completions between progress snapshots.
    pub report_interval: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            server_template: DEFAULT_SERVER_TEMPLATE.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            min_zoom: DEFAULT_ZOOM,
            max_zoom: DEFAULT_ZOOM,
            regions: default_regions(),
            concurrency: DEFAULT_CONCURRENCY,
            submission_delay: DEFAULT_SUBMISSION_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            transport_retry_delay: DEFAULT_TRANSPORT_RETRY_DELAY,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

impl DownloadConfig {
    /// Replaces the region list.
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    /// Sets the zoom range (inclusive).
    pub fn with_zoom_range(mut self, min: u8, max: u8) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Checks the whole surface for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.server_template.contains(placeholder) {
                return Err(ConfigError::BadServerTemplate {
                    template: self.server_template.clone(),
                    placeholder,
                });
            }
        }

        if self.min_zoom > self.max_zoom || self.max_zoom > MAX_ZOOM {
            return Err(ConfigError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }

        if self.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }

        for region in &self.regions {
            validate_bounds(&region.name, &region.bounds)?;
        }

        Ok(())
    }
}

fn validate_bounds(name: &str, bounds: &BoundingBox) -> Result<(), ConfigError> {
    if !bounds.is_ordered() {
        return Err(ConfigError::InvalidBounds {
            name: name.to_string(),
            reason: "min edge exceeds max edge".to_string(),
        });
    }
    if bounds.min_lat < MIN_LAT || bounds.max_lat > MAX_LAT {
        return Err(ConfigError::InvalidBounds {
            name: name.to_string(),
            reason: format!("latitude outside [{}, {}]", MIN_LAT, MAX_LAT),
        });
    }
    if bounds.min_lon < MIN_LON || bounds.max_lon > MAX_LON {
        return Err(ConfigError::InvalidBounds {
            name: name.to_string(),
            reason: format!("longitude outside [{}, {}]", MIN_LON, MAX_LON),
        });
    }
    Ok(())
}

/// Loads a region list from a JSON file.
///
/// The file is a JSON array of `{ "name": ..., "bounds": { "min_lat": ...,
/// "max_lat": ..., "min_lon": ..., "max_lon": ... } }` objects.
pub fn load_regions(path: &Path) -> Result<Vec<Region>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::RegionFileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let regions: Vec<Region> =
        serde_json::from_str(&text).map_err(|source| ConfigError::RegionFileParse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(regions)
}

/// The built-in region set: Vietnam's mainland and the Paracel and Spratly
/// archipelagos.
pub fn default_regions() -> Vec<Region> {
    vec![
        Region::new(
            "Vietnam mainland",
            BoundingBox::new(8.0, 23.5, 102.0, 110.0),
        ),
        Region::new(
            "Paracel Islands (Hoang Sa)",
            BoundingBox::new(15.5, 17.5, 111.0, 113.0),
        ),
        Region::new(
            "Spratly Islands (Truong Sa)",
            BoundingBox::new(6.0, 12.0, 109.5, 117.5),
        ),
    ]
}
