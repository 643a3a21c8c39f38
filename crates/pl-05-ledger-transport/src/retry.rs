//! # Read Retry
//!
//! Reads are idempotent, so a read failing with `Unreachable` or `Timeout`
//! is retried with exponential backoff. Mutations go straight through.

use crate::config::TransportConfig;
use shared_types::TransportError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff delays never exceed this.
const MAX_DELAY: Duration = Duration::from_millis(2_000);

/// Retry budget for reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy from client settings.
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.read_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (starting at 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(factor)
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// Run `op`, retrying retryable failures.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    debug!(
                        "[pl-05] {} failed ({}), retry {}/{} in {:?}",
                        what, e, attempt, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
