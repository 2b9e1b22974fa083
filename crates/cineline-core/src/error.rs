//! Error types for the fetch and sink layers

use std::path::PathBuf;

/// Error from a single fetch attempt.
///
/// Classification drives the retry loop: retryable errors are transient
/// and worth another attempt, the rest resolve the request immediately.
#[derive(Debug)]
pub enum FetchError {
    /// HTTP status outside the 2xx range
    Http { status: u16, message: String },
    /// Connection-level failure before a status was received
    Network(String),
    /// The per-request deadline elapsed
    Timeout,
    /// 2xx response whose body did not decode as JSON
    Decode(String),
    /// The request was refused because shutdown is in progress
    Canceled,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Decode(msg) => write!(f, "undecodable payload: {msg}"),
            Self::Canceled => write!(f, "canceled by shutdown"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Convert a reqwest error, stripping the URL so query credentials
    /// never reach the logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        match e.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                message: e.without_url().to_string(),
            },
            None => Self::Network(e.without_url().to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            // 429 = rate limited, 5xx = server-side; other statuses are
            // definitive for this request
            Self::Http { status, .. } => matches!(status, 429 | 500..=599),
            Self::Network(_) | Self::Timeout => true,
            Self::Decode(_) | Self::Canceled => false,
        }
    }
}

/// Error from reading or writing a persisted sink. Always fatal to the job.
#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// The sink exists but its header lacks the identifying column
    MissingColumn { column: String, path: PathBuf },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Csv(e) => write!(f, "CSV: {e}"),
            Self::MissingColumn { column, path } => {
                write!(f, "column '{column}' not found in {}", path.display())
            }
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for SinkError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}
