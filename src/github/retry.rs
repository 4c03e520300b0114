// Exponential backoff for GitHub operations: base 1s, factor 2, jitter +-25%,
// capped at 60s, up to 5 attempts. Only `ForgeError::is_retryable` errors are
// retried; anything else is returned to the caller immediately.

use crate::error::ForgeError;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_fraction: 0.25,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jitter = capped * self.jitter_fraction;
        let jittered = rand::rng().random_range((capped - jitter).max(0.0)..=(capped + jitter));
        Duration::from_secs_f64(jittered)
    }
}

#[derive(Debug)]
pub struct GitHubRetryHandler {
    policy: RetryPolicy,
}

impl Default for GitHubRetryHandler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl GitHubRetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Runs `operation` until it succeeds, returns a non-retryable error, or
    /// exhausts `max_attempts`.
    pub async fn execute_with_retry<F, Fut, R>(&self, mut operation: F) -> Result<R, ForgeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<R, ForgeError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempt, "github operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(err) if err.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(attempt, ?delay, %err, "retrying github operation");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
