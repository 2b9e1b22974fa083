//! Year-partitioned discovery of the movie catalog
//!
//! Walks the discover endpoint one release year at a time and rebuilds
//! `movies.csv` from scratch. A year that fails outright is skipped and
//! counted; the remaining years still run.

use std::fs;
use std::time::Instant;

use anyhow::Context;
use cineline_core::{
    BatchWriter, Paginator, SharedProgress, WriteMode, fmt_num, is_shutdown_requested,
};

use crate::api::TmdbApi;
use crate::config::HarvestConfig;
use crate::record::MovieRow;

/// Run the discovery stage.
pub fn run(config: &HarvestConfig, progress: SharedProgress) -> anyhow::Result<DiscoverSummary> {
    let start = Instant::now();
    fs::create_dir_all(&config.data_dir).context("Cannot create data directory")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Cannot build fetch runtime")?;

    let api = TmdbApi::new(config).context("Cannot build API client")?;
    let filter = &config.discover;
    let paginator = Paginator::new(config.rate.max_in_flight, filter.max_pages);

    // The catalog is always rebuilt whole; resumption belongs to the
    // per-id stages that follow it.
    let mut writer = BatchWriter::new(
        config.movies_path(),
        WriteMode::Fresh,
        true,
        config.batch_size,
    );

    log::info!(
        "discover starting: years {}..={}, vote_count >= {}, fan-out {}",
        filter.start_year,
        filter.end_year,
        filter.vote_count_gte,
        config.rate.max_in_flight
    );

    let mut summary = DiscoverSummary::empty();
    summary.years_total = (filter.end_year - filter.start_year + 1) as usize;

    for year in filter.start_year..=filter.end_year {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before year {year}");
            summary.interrupted = true;
            break;
        }

        let label = format!("year {year}");
        let bar = progress.partition_bar(&label);
        let source = api.discover_pages(filter, year, bar.clone());

        match runtime.block_on(paginator.collect(&source, &label)) {
            Ok(pages) => {
                summary.years_done += 1;
                summary.pages_failed += pages.pages_failed as usize;
                if pages.clamped {
                    summary.years_clamped += 1;
                }

                let rows: Vec<MovieRow> = pages
                    .into_rows()
                    .iter()
                    .filter_map(MovieRow::from_discover)
                    .collect();
                if rows.is_empty() {
                    summary.years_empty += 1;
                    log::debug!("{label}: no movies matched the filter");
                } else {
                    let written = writer
                        .write_batches(&rows)
                        .with_context(|| format!("Cannot write movies for {label}"))?;
                    summary.rows_written += written;
                    log::info!("{label}: {} movies", fmt_num(written));
                }
            }
            Err(e) => {
                summary.years_failed += 1;
                log::warn!("{label} skipped: {e}");
            }
        }
        bar.finish_and_clear();
    }

    writer.close().context("Cannot finalize movies.csv")?;
    progress.println("");

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
}

/// Summary of one discovery run.
#[derive(Debug)]
pub struct DiscoverSummary {
    pub years_total: usize,
    pub years_done: usize,
    pub years_failed: usize,
    pub years_empty: usize,
    pub years_clamped: usize,
    pub pages_failed: usize,
    pub rows_written: usize,
    pub interrupted: bool,
    pub elapsed: std::time::Duration,
}

impl DiscoverSummary {
    pub fn empty() -> Self {
        Self {
            years_total: 0,
            years_done: 0,
            years_failed: 0,
            years_empty: 0,
            years_clamped: 0,
            pages_failed: 0,
            rows_written: 0,
            interrupted: false,
            elapsed: std::time::Duration::ZERO,
        }
    }

    pub fn log(&self) {
        log::info!("=== Discover Summary ===");
        log::info!(
            "Years: {}/{} harvested ({} failed, {} empty, {} clamped)",
            self.years_done,
            self.years_total,
            self.years_failed,
            self.years_empty,
            self.years_clamped
        );
        log::info!(
            "Rows: {} ({} pages skipped)",
            fmt_num(self.rows_written),
            self.pages_failed
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.interrupted {
            log::warn!("Run was interrupted; the catalog is partial");
        }
    }
}
