//! Per-movie details and credits harvesting
//!
//! Takes the ids discovered into `movies.csv`, subtracts what
//! `movie_details.csv` already holds, and fetches the remainder in
//! batches. Each details payload also feeds `credits.csv`.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use cineline_core::{
    BatchWriter, FetchOutcome, SharedProgress, WriteMode, fmt_num, is_shutdown_requested,
    resolve_write_mode, sink_ids,
};
use futures_util::{StreamExt, stream};

use crate::api::TmdbApi;
use crate::config::HarvestConfig;
use crate::record::{CreditsRow, DetailsRow};

/// Run the details stage.
pub fn run(config: &HarvestConfig, progress: SharedProgress) -> anyhow::Result<DetailsSummary> {
    let start = Instant::now();
    let movies_path = config.movies_path();
    anyhow::ensure!(
        movies_path.exists(),
        "{} not found; run `cineline harvest discover` first",
        movies_path.display()
    );

    let candidates = sink_ids(&movies_path, "id").context("Cannot read the movie catalog")?;
    let details_path = config.details_path();
    let plan = resolve_write_mode(&details_path, "movie_id", &candidates, config.resume)
        .context("Cannot plan the details sink")?;

    log::info!(
        "details starting: {} candidates, {} already harvested, {} to fetch",
        fmt_num(candidates.len()),
        fmt_num(plan.already_present),
        fmt_num(plan.work_set.len())
    );

    let mut summary = DetailsSummary::empty();
    summary.candidates = candidates.len();
    summary.already_present = plan.already_present;
    summary.planned = plan.work_set.len();

    if plan.work_set.is_empty() {
        log::info!("details: nothing to fetch");
        summary.elapsed = start.elapsed();
        summary.log();
        return Ok(summary);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Cannot build fetch runtime")?;
    let api = TmdbApi::new(config).context("Cannot build API client")?;

    let mut details = BatchWriter::new(
        &details_path,
        plan.mode,
        plan.header_needed,
        config.batch_size,
    );
    // The credits sink rides along with the details plan but answers
    // for its own header, its file may be missing even mid-resume.
    let credits_path = config.credits_path();
    let credits_header = match plan.mode {
        WriteMode::Fresh => true,
        WriteMode::Append => !sink_populated(&credits_path),
    };
    let mut credits = BatchWriter::new(&credits_path, plan.mode, credits_header, config.batch_size);

    let bar = progress.work_bar("details", plan.work_set.len() as u64);
    let api = &api;

    for chunk in plan.work_set.chunks(config.batch_size) {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping after the current batch");
            summary.interrupted = true;
            break;
        }

        // Fetch the whole batch, then write it. Nothing is appended
        // for a batch that is still in flight when interrupted.
        let outcomes = runtime.block_on(
            stream::iter(
                chunk
                    .iter()
                    .map(|&id| async move { (id, api.movie_details(id).await) }),
            )
            .buffer_unordered(config.rate.max_in_flight)
            .collect::<Vec<_>>(),
        );

        let ingested_at = Utc::now();
        let mut detail_rows = Vec::with_capacity(outcomes.len());
        let mut credit_rows = Vec::with_capacity(outcomes.len());
        for (id, outcome) in outcomes {
            match outcome {
                FetchOutcome::Success(payload) => {
                    match CreditsRow::from_details(id, &payload, ingested_at) {
                        Some(row) => credit_rows.push(row),
                        None => log::debug!("movie {id}: payload carries no credits"),
                    }
                    detail_rows.push(DetailsRow::new(id, &payload, ingested_at));
                    summary.fetched += 1;
                }
                FetchOutcome::Empty => {
                    summary.empty += 1;
                    log::debug!("movie {id}: gone from the catalog");
                }
                FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                    summary.failed += 1;
                    log::warn!("movie {id}: {e}");
                }
            }
            bar.inc(1);
        }

        details
            .write_batch(&detail_rows)
            .context("Cannot write movie details")?;
        summary.credits_rows += credits
            .write_batch(&credit_rows)
            .context("Cannot write credits")?;
    }

    details.close().context("Cannot finalize movie_details.csv")?;
    credits.close().context("Cannot finalize credits.csv")?;
    bar.finish_and_clear();
    progress.println("");

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
}

fn sink_populated(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Summary of one details run.
#[derive(Debug)]
pub struct DetailsSummary {
    pub candidates: usize,
    pub already_present: usize,
    pub planned: usize,
    pub fetched: usize,
    pub empty: usize,
    pub failed: usize,
    pub credits_rows: usize,
    pub interrupted: bool,
    pub elapsed: std::time::Duration,
}

impl DetailsSummary {
    pub fn empty() -> Self {
        Self {
            candidates: 0,
            already_present: 0,
            planned: 0,
            fetched: 0,
            empty: 0,
            failed: 0,
            credits_rows: 0,
            interrupted: false,
            elapsed: std::time::Duration::ZERO,
        }
    }

    pub fn log(&self) {
        log::info!("=== Details Summary ===");
        log::info!(
            "Movies: {}/{} fetched ({} gone, {} failed)",
            fmt_num(self.fetched),
            fmt_num(self.planned),
            self.empty,
            self.failed
        );
        log::info!(
            "Resume: {} of {} candidates were already on disk",
            fmt_num(self.already_present),
            fmt_num(self.candidates)
        );
        log::info!("Credits: {} rows", fmt_num(self.credits_rows));
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.interrupted {
            log::warn!("Run was interrupted; rerun to finish the remainder");
        }
    }
}
