//! Retry-aware tile fetcher.
//!
//! [`TileFetcher::fetch`] resolves one tile coordinate to a [`FetchOutcome`]:
//!
//! 1. If the artifact already exists, the tile is `Skipped` without touching
//!    the network; re-running a job only downloads what is missing.
//! 2. Otherwise the tile URL is fetched. A 200 persists the body and yields
//!    `Downloaded`; a 404 is the terminal, non-error `NotFound` (open ocean
//!    has no tiles); 403/429 back off linearly and retry; any other status
//!    fails the tile immediately.
//! 3. Transport failures retry after a fixed short delay.
//!
//! Retries are capped by [`FetchPolicy::max_attempts`]; exhaustion yields
//! `Failed` with the last cause. Every outcome is a value, not an error:
//! callers handle the full taxonomy explicitly and one tile's failure never
//! propagates to another.

mod http;

pub use http::{HttpResponse, ReqwestTileClient, TileHttpClient, TransportError};

#[cfg(test)]
pub use http::tests::ScriptedClient;

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use crate::coord::TileCoord;
use crate::store::TileStore;

/// Default cap on attempts per tile (initial try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the linear rate-limit backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(10);

/// Default delay before retrying after a transport failure.
pub const DEFAULT_TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Why a tile ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// The server answered with a status that is neither success, 404, nor
    /// a retryable rate limit.
    Status(u16),

    /// Every attempt was answered 403/429.
    RateLimited {
        /// Attempts consumed.
        attempts: u32,
    },

    /// Every attempt failed at the transport level.
    Transport {
        /// Attempts consumed.
        attempts: u32,
        /// The last transport error observed.
        last: TransportError,
    },

    /// The tile downloaded but could not be persisted.
    Store(String),
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Status(code) => write!(f, "HTTP {}", code),
            FailReason::RateLimited { attempts } => {
                write!(f, "rate limited after {} attempts", attempts)
            }
            FailReason::Transport { attempts, last } => {
                write!(f, "transport failure after {} attempts: {}", attempts, last)
            }
            FailReason::Store(msg) => write!(f, "write failed: {}", msg),
        }
    }
}

/// Per-tile resolution, produced exactly once per coordinate per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tile was fetched and persisted.
    Downloaded,

    /// The artifact already existed; no network call was made.
    Skipped,

    /// The server has no data for this tile (terminal, not an error).
    NotFound,

    /// The tile could not be obtained this run.
    Failed(FailReason),
}

impl FetchOutcome {
    /// True for the `Failed` variant.
    pub fn is_failure(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Skip/retry/backoff policy knobs.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Maximum attempts per tile, initial try included.
    pub max_attempts: u32,

    /// Base delay for rate-limit backoff; the sleep after failed attempt
    /// `k` is `backoff_base * k`.
    pub backoff_base: Duration,

    /// Fixed delay before retrying a transport failure.
    pub transport_retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            transport_retry_delay: DEFAULT_TRANSPORT_RETRY_DELAY,
        }
    }
}

/// Fetches single tiles against a URL template, writing artifacts through a
/// [`TileStore`].
///
/// Generic over the HTTP client so tests inject scripted responses; share it
/// across workers behind an `Arc`.
pub struct TileFetcher<C: TileHttpClient> {
    client: C,
    store: TileStore,
    url_template: String,
    policy: FetchPolicy,
}

impl<C: TileHttpClient> TileFetcher<C> {
    /// Creates a fetcher.
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for every request
    /// * `store` - Artifact store for skip checks and persistence
    /// * `url_template` - URL with `{z}`, `{x}`, `{y}` placeholders
    /// * `policy` - Retry/backoff knobs
    pub fn new(client: C, store: TileStore, url_template: impl Into<String>, policy: FetchPolicy) -> Self {
        Self {
            client,
            store,
            url_template: url_template.into(),
            policy,
        }
    }

    /// The artifact store backing this fetcher.
    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Builds the request URL for a tile.
    pub fn tile_url(&self, tile: &TileCoord) -> String {
        self.url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// Resolves one tile to its outcome. See the module docs for the policy.
    pub async fn fetch(&self, tile: TileCoord) -> FetchOutcome {
        if self.store.contains(&tile) {
            debug!(%tile, "artifact exists, skipping");
            return FetchOutcome::Skipped;
        }

        let url = self.tile_url(&tile);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match self.client.get(&url).await {
                Ok(response) => match response.status {
                    200 => {
                        return match self.store.write(&tile, &response.body).await {
                            Ok(()) => {
                                debug!(%tile, bytes = response.body.len(), "downloaded");
                                FetchOutcome::Downloaded
                            }
                            Err(e) => {
                                warn!(%tile, error = %e, "failed to persist tile");
                                FetchOutcome::Failed(FailReason::Store(e.to_string()))
                            }
                        };
                    }
                    404 => {
                        debug!(%tile, "no data for tile");
                        return FetchOutcome::NotFound;
                    }
                    403 | 429 => {
                        if attempt >= max_attempts {
                            warn!(%tile, attempts = attempt, "rate limit retries exhausted");
                            return FetchOutcome::Failed(FailReason::RateLimited {
                                attempts: attempt,
                            });
                        }
                        let delay = self.policy.backoff_base * attempt;
                        warn!(
                            %tile,
                            status = response.status,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    status => {
                        warn!(%tile, status, "unexpected status");
                        return FetchOutcome::Failed(FailReason::Status(status));
                    }
                },
                Err(error) => {
                    if attempt >= max_attempts {
                        warn!(%tile, attempts = attempt, error = %error, "transport retries exhausted");
                        return FetchOutcome::Failed(FailReason::Transport {
                            attempts: attempt,
                            last: error,
                        });
                    }
                    debug!(%tile, attempt, error = %error, "transport failure, retrying");
                    tokio::time::sleep(self.policy.transport_retry_delay).await;
                }
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn tile() -> TileCoord {
        TileCoord::new(11, 1604, 886)
    }

    fn quick_policy() -> FetchPolicy {
        FetchPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_secs(10),
            transport_retry_delay: Duration::from_secs(3),
        }
    }

    fn fetcher_with(
        script: Vec<Result<HttpResponse, TransportError>>,
        dir: &std::path::Path,
    ) -> TileFetcher<ScriptedClient> {
        TileFetcher::new(
            ScriptedClient::new(script),
            TileStore::new(dir),
            "https://tiles.example.com/{z}/{x}/{y}.png",
            quick_policy(),
        )
    }

    #[test]
    fn test_tile_url_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(200, &b""[..]))], dir.path());
        assert_eq!(
            fetcher.tile_url(&tile()),
            "https://tiles.example.com/11/1604/886.png"
        );
    }

    #[tokio::test]
    async fn test_success_downloads_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(200, &b"png"[..]))], dir.path());

        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert!(fetcher.store().contains(&tile()));
        assert_eq!(fetcher.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_artifact_skips_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(200, &b"new"[..]))], dir.path());
        fetcher.store().write(&tile(), b"original").await.unwrap();

        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::Skipped);
        assert_eq!(fetcher.client.calls(), 0, "skip must not hit the network");
        let bytes = tokio::fs::read(fetcher.store().tile_path(&tile()))
            .await
            .unwrap();
        assert_eq!(bytes, b"original", "skip must leave the artifact untouched");
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(200, &b"png"[..]))], dir.path());

        assert_eq!(fetcher.fetch(tile()).await, FetchOutcome::Downloaded);
        for _ in 0..3 {
            assert_eq!(fetcher.fetch(tile()).await, FetchOutcome::Skipped);
        }
        assert_eq!(fetcher.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_terminal_after_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(404, &b""[..]))], dir.path());

        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::NotFound);
        assert_eq!(fetcher.client.calls(), 1);
        assert!(!fetcher.store().contains(&tile()));
    }

    #[tokio::test]
    async fn test_unexpected_status_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(500, &b""[..]))], dir.path());

        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::Failed(FailReason::Status(500)));
        assert!(outcome.is_failure());
        assert_eq!(fetcher.client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_rate_limit_exhausts_attempts_with_linear_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Ok(HttpResponse::new(429, &b""[..]))], dir.path());

        let started = Instant::now();
        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed(FailReason::RateLimited { attempts: 3 })
        );
        assert_eq!(fetcher.client.calls(), 3);
        // Linear backoff: 1*base after attempt 1, 2*base after attempt 2,
        // nothing after the final attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(10 + 20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_is_treated_as_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(
            vec![
                Ok(HttpResponse::new(403, &b""[..])),
                Ok(HttpResponse::new(200, &b"png"[..])),
            ],
            dir.path(),
        );

        let started = Instant::now();
        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(fetcher.client.calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_retry_with_fixed_delay() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Connection("reset".into())),
                Ok(HttpResponse::new(200, &b"png"[..])),
            ],
            dir.path(),
        );

        let started = Instant::now();
        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(fetcher.client.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3 + 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_exhaustion_reports_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher_with(vec![Err(TransportError::Timeout)], dir.path());

        let outcome = fetcher.fetch(tile()).await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed(FailReason::Transport {
                attempts: 3,
                last: TransportError::Timeout,
            })
        );
        assert_eq!(fetcher.client.calls(), 3);
    }

    #[tokio::test]
    async fn test_fail_reason_display() {
        assert_eq!(FailReason::Status(502).to_string(), "HTTP 502");
        assert!(FailReason::RateLimited { attempts: 3 }
            .to_string()
            .contains("3 attempts"));
    }
}
