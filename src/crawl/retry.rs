//! Bounded retry with exponential backoff for page fetches.

use crate::config::Config;
use crate::expo::client::PageFetcher;
use crate::expo::error::FetchError;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure; doubled after each further failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Policy that never waits between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff: Duration::ZERO }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }

    /// Fetches `url`, retrying transient failures.
    ///
    /// Non-retryable failures return immediately. When every attempt fails the
    /// result is `FetchError::Exhausted` carrying the last error.
    pub async fn fetch<F>(&self, fetcher: &F, url: &str) -> Result<String, FetchError>
    where
        F: PageFetcher + ?Sized,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match fetcher.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let wait = self.delay_for(attempt);
                    warn!("{} (attempt {}/{}), retrying in {:?}", e, attempt, max_attempts, wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
