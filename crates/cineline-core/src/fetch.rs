//! Rate-limited JSON fetcher
//!
//! One [`Fetcher`] is built per job and shared by reference across all
//! concurrent requests. Every request passes the same admission gate,
//! so the configured budget bounds the job as a whole.

use std::time::Duration;

use crate::budget::{RateBudget, RateGate};
use crate::error::FetchError;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::shutdown;

/// One GET to resolve, with a short label for log lines.
///
/// Query parameters stay separate from the URL so the credential never
/// appears in anything a log line might carry.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub label: String,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            label: label.into(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }
}

/// Terminal state of a request after retries.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Decoded JSON payload.
    Success(serde_json::Value),
    /// The resource is absent or its payload is not worth keeping.
    Empty,
    /// Worth retrying. Only [`Fetcher::fetch_once`] produces this;
    /// the retry driver resolves it before returning.
    TransientFailure(FetchError),
    /// Definitive failure for this request.
    PermanentFailure(FetchError),
}

impl FetchOutcome {
    pub fn ok(self) -> Option<serde_json::Value> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Map a request error to its outcome class.
fn classify_error(label: &str, err: FetchError, retry_empty: bool) -> FetchOutcome {
    match err {
        FetchError::Http { status: 404, .. } => {
            log::debug!("{label}: not found, treated as empty");
            FetchOutcome::Empty
        }
        FetchError::Decode(_) if retry_empty => FetchOutcome::TransientFailure(err),
        FetchError::Decode(reason) => {
            log::warn!("{label}: undecodable payload ({reason}), treated as empty");
            FetchOutcome::Empty
        }
        e if e.is_retryable() => FetchOutcome::TransientFailure(e),
        e => FetchOutcome::PermanentFailure(e),
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    gate: RateGate,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        budget: &RateBudget,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            gate: RateGate::new(budget),
            retry,
        })
    }

    /// Resolve one request, retrying transient failures with backoff.
    pub async fn fetch(&self, req: &FetchRequest) -> FetchOutcome {
        retry_with_backoff(&self.retry, &req.label, || self.fetch_once(req)).await
    }

    /// One admission and one attempt, classified but not retried.
    async fn fetch_once(&self, req: &FetchRequest) -> FetchOutcome {
        if shutdown::is_shutdown_requested() {
            return FetchOutcome::PermanentFailure(FetchError::Canceled);
        }
        let _slot = match self.gate.admit().await {
            Ok(slot) => slot,
            Err(e) => return FetchOutcome::PermanentFailure(e),
        };
        match self.attempt(req).await {
            Ok(value) => FetchOutcome::Success(value),
            Err(e) => classify_error(&req.label, e, self.retry.retry_empty),
        }
    }

    async fn attempt(&self, req: &FetchRequest) -> Result<serde_json::Value, FetchError> {
        let response = self
            .client
            .get(&req.url)
            .query(&req.params)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("status error").to_string(),
            });
        }
        let body = response.text().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> FetchError {
        FetchError::Http {
            status,
            message: "test".into(),
        }
    }

    #[test]
    fn not_found_is_empty() {
        assert!(matches!(
            classify_error("movie 1", http(404), false),
            FetchOutcome::Empty
        ));
    }

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        for status in [429, 500, 502, 503] {
            assert!(matches!(
                classify_error("movie 1", http(status), false),
                FetchOutcome::TransientFailure(_)
            ));
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403] {
            assert!(matches!(
                classify_error("movie 1", http(status), false),
                FetchOutcome::PermanentFailure(_)
            ));
        }
    }

    #[test]
    fn network_and_timeout_are_transient() {
        assert!(matches!(
            classify_error("movie 1", FetchError::Timeout, false),
            FetchOutcome::TransientFailure(_)
        ));
        assert!(matches!(
            classify_error("movie 1", FetchError::Network("reset".into()), false),
            FetchOutcome::TransientFailure(_)
        ));
    }

    #[test]
    fn undecodable_payload_resolves_empty_by_default() {
        assert!(matches!(
            classify_error("movie 1", FetchError::Decode("eof".into()), false),
            FetchOutcome::Empty
        ));
    }

    #[test]
    fn undecodable_payload_retries_when_configured() {
        assert!(matches!(
            classify_error("movie 1", FetchError::Decode("eof".into()), true),
            FetchOutcome::TransientFailure(FetchError::Decode(_))
        ));
    }

    #[test]
    fn cancellation_is_permanent() {
        assert!(matches!(
            classify_error("movie 1", FetchError::Canceled, false),
            FetchOutcome::PermanentFailure(FetchError::Canceled)
        ));
    }

    #[test]
    fn request_params_accumulate_in_order() {
        let req = FetchRequest::new("https://api.example.org/3/discover/movie", "year 2020")
            .param("primary_release_date.gte", "2020-01-01")
            .param("vote_count.gte", 10)
            .param("page", 1);

        assert_eq!(req.params.len(), 3);
        assert_eq!(req.params[0].0, "primary_release_date.gte");
        assert_eq!(req.params[1], ("vote_count.gte".to_string(), "10".to_string()));
        assert!(!req.url.contains('?'));
    }

    #[test]
    fn outcome_ok_extracts_success_payload() {
        let value = serde_json::json!({"id": 550});
        assert_eq!(
            FetchOutcome::Success(value.clone()).ok(),
            Some(value)
        );
        assert_eq!(FetchOutcome::Empty.ok(), None);
    }
}
