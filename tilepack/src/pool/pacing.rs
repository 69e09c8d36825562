//! Submission pacing abstraction.
//!
//! The pool throttles in two independent ways: the semaphore caps how many
//! fetches are in flight, and a [`SubmissionPacer`] spaces out *submissions*
//! regardless of how fast completions come back. Keeping the pacer behind a
//! trait lets tests run the pool flat out and keeps the two throttles
//! verifiable separately.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default delay between tiles handed to the pool.
pub const DEFAULT_SUBMISSION_DELAY: Duration = Duration::from_millis(200);

/// Controls the gap between consecutive submissions.
///
/// # Implementors
///
/// - [`FixedIntervalPacer`] - sleeps a fixed delay; the production pacer
/// - [`NoPacing`] - returns immediately; for tests
pub trait SubmissionPacer: Send + Sync {
    /// Awaited once after each tile handed to the pool.
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Pacer that sleeps a fixed interval between submissions.
#[derive(Debug, Clone, Copy)]
pub struct FixedIntervalPacer {
    delay: Duration,
}

impl FixedIntervalPacer {
    /// Creates a pacer with the given inter-submission delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedIntervalPacer {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMISSION_DELAY)
    }
}

impl SubmissionPacer for FixedIntervalPacer {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(self.delay))
    }
}

/// Pacer that never pauses.
///
/// Useful for unit tests where submission rate is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl SubmissionPacer for NoPacing {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(std::future::ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_interval_pacer_sleeps() {
        let pacer = FixedIntervalPacer::new(Duration::from_millis(200));

        let started = Instant::now();
        pacer.pause().await;
        pacer.pause().await;

        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pacing_returns_immediately() {
        let pacer = NoPacing;

        let started = Instant::now();
        pacer.pause().await;

        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let pacer: Arc<dyn SubmissionPacer> = Arc::new(NoPacing);
        pacer.pause().await;

        let pacer: Arc<dyn SubmissionPacer> = Arc::new(FixedIntervalPacer::new(Duration::ZERO));
        pacer.pause().await;
    }

    #[test]
    fn test_default_delay() {
        assert_eq!(FixedIntervalPacer::default().delay(), DEFAULT_SUBMISSION_DELAY);
    }
}
