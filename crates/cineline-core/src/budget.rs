//! Request budget: bounded in-flight concurrency plus a sliding-window
//! rate cap shared by every request in a job

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::FetchError;

/// Declarative request budget, read from config once per job.
#[derive(Debug, Clone)]
pub struct RateBudget {
    /// Requests admitted per window.
    pub window_requests: usize,
    /// Length of the rate window.
    pub window: Duration,
    /// Requests allowed in flight at once.
    pub max_in_flight: usize,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self {
            window_requests: 35,
            window: Duration::from_secs(1),
            max_in_flight: 10,
        }
    }
}

/// Admission gate enforcing a [`RateBudget`].
///
/// Admission takes a concurrency slot first, then a window token. The
/// slot is held for the whole request via the returned [`InFlight`]
/// guard; the token replenishes one window length after admission,
/// independent of how long the request runs.
pub struct RateGate {
    in_flight: Arc<Semaphore>,
    window_tokens: Arc<Semaphore>,
    window: Duration,
}

/// RAII concurrency slot. Dropping it readmits the next waiter.
pub struct InFlight {
    _permit: OwnedSemaphorePermit,
}

impl RateGate {
    pub fn new(budget: &RateBudget) -> Self {
        Self {
            in_flight: Arc::new(Semaphore::new(budget.max_in_flight)),
            window_tokens: Arc::new(Semaphore::new(budget.window_requests)),
            window: budget.window,
        }
    }

    /// Wait for a concurrency slot and a window token.
    pub async fn admit(&self) -> Result<InFlight, FetchError> {
        let slot = Arc::clone(&self.in_flight)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Canceled)?;
        let token = Arc::clone(&self.window_tokens)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Canceled)?;

        // Replenish the token one window after admission so the cap
        // measures admissions per window, not completions.
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            drop(token);
        });

        Ok(InFlight { _permit: slot })
    }
}
