//! Cineline TMDB - movie catalog harvesting stages
//!
//! This crate holds the four harvesting stages that feed the raw data
//! directory: year-partitioned discovery, per-movie details and
//! credits, per-person records, and the reference seed tables.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cineline_core::ProgressContext;
//! use cineline_tmdb::{HarvestConfig, discover};
//!
//! let config = HarvestConfig {
//!     api_key: std::env::var("TMDB_API_KEY").expect("TMDB_API_KEY not set"),
//!     ..Default::default()
//! };
//!
//! let progress = Arc::new(ProgressContext::new());
//! let summary = discover::run(&config, progress).expect("Discovery failed");
//! println!("Wrote {} movies", summary.rows_written);
//! ```

pub mod api;
pub mod config;
pub mod details;
pub mod discover;
pub mod people;
pub mod record;
pub mod seeds;

// Re-exports for convenience
pub use api::TmdbApi;
pub use config::{DiscoverFilter, HarvestConfig};
pub use details::DetailsSummary;
pub use discover::DiscoverSummary;
pub use people::PeopleSummary;
pub use seeds::SeedsSummary;
