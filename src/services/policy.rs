use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Timeout and retry budget applied to every store call.
///
/// Retries back off exponentially:
/// `delay = min(initial_delay * 2^attempt, max_delay) + random_jitter`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    /// Upper bound for a single attempt.
    pub timeout: Duration,
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: Duration::from_millis(50),
        }
    }
}

impl CallPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.store_timeout_ms),
            max_retries: config.store_max_retries,
            initial_delay: Duration::from_millis(config.store_retry_base_ms),
            max_delay: Duration::from_millis(config.store_retry_max_ms),
            jitter: Duration::from_millis(config.store_retry_base_ms / 2),
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run one attempt under the timeout.
    pub async fn once<T, F>(&self, operation: &'static str, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(operation)),
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. Only use this for idempotent calls.
    pub async fn retrying<T, F, Fut>(&self, operation: &'static str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.once(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let jitter_ms = self.jitter.as_millis() as u64;
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
                    let delay = self.backoff(attempt) + jitter;
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying store call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
