//! Bounded exponential backoff for transient HTTP failures

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::constants::limits;
use crate::errors::{FetchError, FetchResult};

/// Retry bound and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Fraction of each delay added as random jitter
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: limits::MAX_RETRIES,
            base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            jitter_factor: limits::BACKOFF_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// Whether attempt number `attempt` (0-based) may be followed by another
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        attempt < self.max_retries && error.is_transient()
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`, capped, plus jitter
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let jitter = delay.mul_f64(self.jitter_factor * fastrand::f64());
        delay + jitter
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    ///
    /// Exhausting the budget on a transient error yields `MaxRetriesExceeded`.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> FetchResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(attempt, &e) => {
                    let delay = self.backoff_duration(attempt);
                    attempt += 1;
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                        what,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    error!("{} failed after {} retries: {}", what, self.max_retries, e);
                    return Err(FetchError::MaxRetriesExceeded {
                        max_retries: self.max_retries,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
