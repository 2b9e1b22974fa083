//! Cineline Core - the concurrent fetch engine shared by every harvest stage
//!
//! This crate provides the rate-limited fetcher, pagination driver,
//! resumption planner, and batch writer that the dataset stages build on.

pub mod batch;
pub mod budget;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod page;
pub mod progress;
pub mod resume;
pub mod retry;
pub mod shutdown;

// Re-exports for convenience
pub use batch::BatchWriter;
pub use budget::{InFlight, RateBudget, RateGate};
pub use error::{FetchError, SinkError};
pub use fetch::{FetchOutcome, FetchRequest, Fetcher};
pub use logging::{IndicatifLogger, init_logging};
pub use page::{PageFetch, Paginator, PartitionPages, clamp_pages};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use resume::{ResumePlan, ResumePolicy, WriteMode, resolve_write_mode, sink_ids};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag};
