//! Bounded exponential-backoff retry for transient HTTP failures.

use crate::error::{SourceError, SourceResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time.
    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << (retry - 1).min(16);
        (self.initial_delay * factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the attempt
/// budget is spent.
///
/// Non-transient errors (4xx, parse failures) are returned immediately;
/// exhaustion wraps the last transient error.
pub async fn fetch_with_retry<T, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    mut op: F,
) -> SourceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SourceResult<T>>,
{
    let mut last_err: Option<SourceError> = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                warn!(
                    source = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Transient fetch failure"
                );
                last_err = Some(e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(SourceError::RetriesExhausted {
        attempts: policy.max_attempts,
        last: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
