//! Retry logic with exponential backoff
//!
//! Exponential backoff with jitter, shared by the feed's producer tasks.
//! Jitter keeps pollers for many pairs from retrying in lockstep after a
//! venue-wide outage.

use std::future::Future;
use std::time::Duration;

use crate::adapters::errors::{SourceError, SourceResult};
use crate::config::BackoffConfig;

/// Upper bound (exclusive) of the random jitter added to each delay
const JITTER_MS: u64 = 200;

/// Stateful backoff for one retry loop.
///
/// Delay doubles with every consecutive failure, capped at `max_delay_ms`.
/// `reset()` after a success starts over from `initial_delay_ms`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Number of consecutive failures recorded so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next retry, without jitter.
    pub fn base_delay_ms(&self) -> u64 {
        let shift = self.failures.min(32);
        self.config
            .initial_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.config.max_delay_ms)
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay_ms();
        self.failures = self.failures.saturating_add(1);
        Duration::from_millis(base + rand::random::<u64>() % JITTER_MS)
    }

    /// Longest delay this backoff can produce, used for non-transient errors.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.config.max_delay_ms)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

/// Run `op` up to `max_attempts` times, sleeping with backoff between tries.
///
/// Returns the first success or the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    config: BackoffConfig,
    max_attempts: u32,
    label: &str,
    mut op: F,
) -> SourceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SourceResult<T>>,
{
    let mut backoff = Backoff::new(config);
    let mut last_error: Option<SourceError> = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "{}: attempt failed",
                    label
                );
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff.next_delay()).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        SourceError::ConnectionFailed(format!("{}: no attempts made", label))
    }))
}
