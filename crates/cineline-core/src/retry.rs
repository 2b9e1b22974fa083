//! Retry with exponential backoff for single API requests

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;
use crate::fetch::FetchOutcome;

/// Retry behavior shared read-only by every fetch in a job.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, the first try included.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Treat an undecodable payload as transient instead of resolving
    /// the request as empty on the spot.
    pub retry_empty: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            retry_empty: false,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based):
    /// min(base * 2^(attempt-1), cap).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay)
    }
}

/// Drive repeated attempts of one request until it resolves.
///
/// Transient failures sleep the backoff delay and try again, with a warn
/// line before each sleep (never before the first attempt). On exhaustion
/// the request degrades to a permanent failure, or to empty when the last
/// error was an undecodable payload.
pub async fn retry_with_backoff<F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut attempt_fn: F,
) -> FetchOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let mut attempt = 1u32;
    loop {
        match attempt_fn().await {
            FetchOutcome::TransientFailure(e) if attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                log::warn!(
                    "{label}: attempt {attempt}/{} failed ({e}), retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            FetchOutcome::TransientFailure(e) => {
                log::warn!("{label}: giving up after {attempt} attempts: {e}");
                return match e {
                    FetchError::Decode(_) => FetchOutcome::Empty,
                    other => FetchOutcome::PermanentFailure(other),
                };
            }
            resolved => return resolved,
        }
    }
}
