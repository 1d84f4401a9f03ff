//! Rate limiting and retry utilities for the catalog scraper.
//!
//! [`RateLimiter`] enforces a randomized pause drawn uniformly from the
//! configured `delay_range` before every outbound request. [`retry_with_backoff`]
//! wraps a fallible fetch and retries transient failures (timeouts, connection
//! errors, HTTP 429/5xx gateway statuses), pausing through the same limiter
//! with an exponential backoff added on top. Non-retryable errors are
//! propagated immediately.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use breakthrough_core::{secs_to_duration, ScraperConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ScraperError;
use crate::time::{Sleeper, TokioSleeper};

/// Randomized inter-request delay.
///
/// Safe to share between workers: the RNG sits behind a mutex that is only
/// held while drawing, never across an `.await`.
pub struct RateLimiter {
    min_secs: f64,
    max_secs: f64,
    rng: Mutex<StdRng>,
    sleeper: Arc<dyn Sleeper>,
    waits: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_secs", &self.min_secs)
            .field("max_secs", &self.max_secs)
            .field("waits", &self.waits.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter with an OS-seeded RNG that sleeps on the tokio timer.
    #[must_use]
    pub fn new(delay_range: (f64, f64)) -> Self {
        Self::with_rng(delay_range, StdRng::from_os_rng(), Arc::new(TokioSleeper))
    }

    /// Creates a limiter whose delay sequence is fully determined by `seed`.
    #[must_use]
    pub fn seeded(delay_range: (f64, f64), seed: u64, sleeper: Arc<dyn Sleeper>) -> Self {
        Self::with_rng(delay_range, StdRng::seed_from_u64(seed), sleeper)
    }

    fn with_rng(delay_range: (f64, f64), rng: StdRng, sleeper: Arc<dyn Sleeper>) -> Self {
        let (min, max) = delay_range;
        let min_secs = if min.is_finite() { min.max(0.0) } else { 0.0 };
        let max_secs = if max.is_finite() { max.max(min_secs) } else { min_secs };
        Self {
            min_secs,
            max_secs,
            rng: Mutex::new(rng),
            sleeper,
            waits: AtomicU64::new(0),
        }
    }

    /// Draws the next delay from `[min, max]`.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            self.rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        secs_to_duration(secs)
    }

    /// Suspends for one randomized delay.
    pub async fn wait(&self) {
        let delay = self.next_delay();
        self.waits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "rate limiter wait"
        );
        self.sleeper.sleep(delay).await;
    }

    /// Suspends for `backoff` plus one randomized delay.
    pub async fn wait_with_backoff(&self, backoff: Duration) {
        let delay = backoff.saturating_add(self.next_delay());
        self.waits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            "rate limiter backoff wait"
        );
        self.sleeper.sleep(delay).await;
    }

    /// Total number of waits performed through this limiter.
    #[must_use]
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }
}

/// Retry budget and backoff schedule for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: secs_to_duration(config.backoff_base_secs),
            backoff_cap: secs_to_duration(config.backoff_cap_secs),
        }
    }

    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `backoff_cap`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << attempt.min(31))
            .min(self.backoff_cap)
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On success the result is returned immediately. On a retryable error the
/// limiter waits `policy.backoff_for(attempt)` plus one randomized delay and
/// the operation runs again, up to `policy.max_retries` additional attempts.
///
/// | Attempt | Wait before next attempt |
/// |---------|--------------------------|
/// | 0 (initial) | none |
/// | 1 (first retry) | base × 2^0 + jitter |
/// | 2 (second retry) | base × 2^1 + jitter |
/// | 3 (third retry) | base × 2^2 + jitter |
///
/// # Errors
///
/// - Non-retryable errors are returned unchanged without waiting.
/// - When retries run out, [`ScraperError::FetchExhausted`] wraps the last
///   underlying error together with the number of attempts made.
pub async fn retry_with_backoff<T, F, Fut>(
    limiter: &RateLimiter,
    policy: RetryPolicy,
    url: &str,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        if attempt >= policy.max_retries {
            tracing::error!(
                url,
                attempts = attempt + 1,
                error = %err,
                "transient fetch error; retries exhausted"
            );
            return Err(ScraperError::FetchExhausted {
                url: url.to_owned(),
                attempts: attempt + 1,
                source: Box::new(err),
            });
        }

        let backoff = policy.backoff_for(attempt);
        tracing::warn!(
            url,
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient fetch error; retrying after backoff"
        );
        limiter.wait_with_backoff(backoff).await;
        attempt += 1;
    }
}
