//! Per-person harvesting
//!
//! Mines person ids out of the cast column of `credits.csv`, subtracts
//! what `people.csv` already holds, and fetches the remainder.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use cineline_core::{
    BatchWriter, FetchOutcome, SharedProgress, fmt_num, is_shutdown_requested, resolve_write_mode,
};
use futures_util::{StreamExt, stream};

use crate::api::TmdbApi;
use crate::config::HarvestConfig;
use crate::record::{PersonRow, person_ids_from_cast};

/// Only cast members with billing order at or below this are harvested.
const TOP_BILLED_ORDER: u64 = 5;

/// Run the people stage.
pub fn run(config: &HarvestConfig, progress: SharedProgress) -> anyhow::Result<PeopleSummary> {
    let start = Instant::now();
    let credits_path = config.credits_path();
    anyhow::ensure!(
        credits_path.exists(),
        "{} not found; run `cineline harvest details` first",
        credits_path.display()
    );

    let mined = mine_candidates(&credits_path, TOP_BILLED_ORDER)?;
    let people_path = config.people_path();
    let plan = resolve_write_mode(&people_path, "id", &mined, config.resume)
        .context("Cannot plan the people sink")?;

    let mut summary = PeopleSummary::empty();
    summary.mined = mined.len();
    summary.candidates = plan.already_present + plan.work_set.len();
    summary.already_present = plan.already_present;
    summary.planned = plan.work_set.len();

    log::info!(
        "people starting: {} ids mined, {} unique, {} already harvested, {} to fetch",
        fmt_num(summary.mined),
        fmt_num(summary.candidates),
        fmt_num(summary.already_present),
        fmt_num(summary.planned)
    );

    if plan.work_set.is_empty() {
        log::info!("people: nothing to fetch");
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
    let mut writer = BatchWriter::new(
        &people_path,
        plan.mode,
        plan.header_needed,
        config.batch_size,
    );

    let bar = progress.work_bar("people", plan.work_set.len() as u64);
    let api = &api;

    for chunk in plan.work_set.chunks(config.batch_size) {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping after the current batch");
            summary.interrupted = true;
            break;
        }

        let outcomes = runtime.block_on(
            stream::iter(
                chunk
                    .iter()
                    .map(|&id| async move { (id, api.person(id).await) }),
            )
            .buffer_unordered(config.rate.max_in_flight)
            .collect::<Vec<_>>(),
        );

        let mut rows = Vec::with_capacity(outcomes.len());
        for (id, outcome) in outcomes {
            match outcome {
                FetchOutcome::Success(payload) => match PersonRow::from_payload(&payload) {
                    Some(row) => {
                        rows.push(row);
                        summary.fetched += 1;
                    }
                    None => {
                        summary.empty += 1;
                        log::debug!("person {id}: payload has no id");
                    }
                },
                FetchOutcome::Empty => {
                    summary.empty += 1;
                    log::debug!("person {id}: gone from the catalog");
                }
                FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                    summary.failed += 1;
                    log::warn!("person {id}: {e}");
                }
            }
            bar.inc(1);
        }

        writer.write_batch(&rows).context("Cannot write people")?;
    }

    writer.close().context("Cannot finalize people.csv")?;
    bar.finish_and_clear();
    progress.println("");

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
}

/// Collect person ids from the cast column, in row order, duplicates
/// included. The resume planner cuts duplicates later.
fn mine_candidates(credits_path: &Path, max_order: u64) -> anyhow::Result<Vec<u64>> {
    let mut reader = csv::Reader::from_path(credits_path)
        .with_context(|| format!("Cannot open {}", credits_path.display()))?;
    let headers = reader.headers().context("Cannot read the credits header")?;
    let cast_idx = headers
        .iter()
        .position(|name| name == "cast")
        .context("credits.csv has no cast column")?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.context("Cannot read a credits row")?;
        if let Some(cast) = record.get(cast_idx) {
            ids.extend(person_ids_from_cast(cast, max_order));
        }
    }
    Ok(ids)
}

/// Summary of one people run.
#[derive(Debug)]
pub struct PeopleSummary {
    pub mined: usize,
    pub candidates: usize,
    pub already_present: usize,
    pub planned: usize,
    pub fetched: usize,
    pub empty: usize,
    pub failed: usize,
    pub interrupted: bool,
    pub elapsed: std::time::Duration,
}

impl PeopleSummary {
    pub fn empty() -> Self {
        Self {
            mined: 0,
            candidates: 0,
            already_present: 0,
            planned: 0,
            fetched: 0,
            empty: 0,
            failed: 0,
            interrupted: false,
            elapsed: std::time::Duration::ZERO,
        }
    }

    pub fn log(&self) {
        log::info!("=== People Summary ===");
        log::info!(
            "People: {}/{} fetched ({} gone, {} failed)",
            fmt_num(self.fetched),
            fmt_num(self.planned),
            self.empty,
            self.failed
        );
        log::info!(
            "Resume: {} of {} unique candidates were already on disk",
            fmt_num(self.already_present),
            fmt_num(self.candidates)
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.interrupted {
            log::warn!("Run was interrupted; rerun to finish the remainder");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn credits_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn mining_respects_the_billing_cutoff() {
        let cast = r#"[{""id"": 819, ""order"": 0}, {""id"": 1100, ""order"": 9}]"#;
        let file = credits_fixture(&format!(
            "movie_id,cast,crew,ingested_at\n550,\"{cast}\",\"[]\",2024-05-01T00:00:00Z\n"
        ));

        let ids = mine_candidates(file.path(), TOP_BILLED_ORDER).unwrap();
        assert_eq!(ids, vec![819]);
    }

    #[test]
    fn mining_keeps_row_order_and_duplicates() {
        let first = r#"[{""id"": 5, ""order"": 0}, {""id"": 3, ""order"": 1}]"#;
        let second = r#"[{""id"": 3, ""order"": 0}]"#;
        let file = credits_fixture(&format!(
            "movie_id,cast,crew,ingested_at\n\
             1,\"{first}\",\"[]\",2024-05-01T00:00:00Z\n\
             2,\"{second}\",\"[]\",2024-05-01T00:00:00Z\n"
        ));

        let ids = mine_candidates(file.path(), TOP_BILLED_ORDER).unwrap();
        assert_eq!(ids, vec![5, 3, 3]);
    }

    #[test]
    fn mining_without_a_cast_column_is_fatal() {
        let file = credits_fixture("movie_id,crew\n550,\"[]\"\n");
        assert!(mine_candidates(file.path(), TOP_BILLED_ORDER).is_err());
    }

    #[test]
    fn people_summary_log_does_not_panic() {
        let summary = PeopleSummary {
            mined: 120_000,
            candidates: 40_000,
            already_present: 30_000,
            planned: 10_000,
            fetched: 9_900,
            empty: 50,
            failed: 50,
            interrupted: false,
            elapsed: std::time::Duration::from_secs(600),
        };
        summary.log();
        PeopleSummary::empty().log();
    }
}
