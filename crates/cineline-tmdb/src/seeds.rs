//! Reference dataset harvesting
//!
//! Genres, countries and languages are tiny and change rarely, so each
//! run rewrites them whole. Any failure here is fatal, downstream
//! models join against these tables.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use cineline_core::{BatchWriter, FetchOutcome, SharedProgress, WriteMode, is_shutdown_requested};
use serde::Serialize;
use serde_json::Value;

use crate::api::TmdbApi;
use crate::config::HarvestConfig;
use crate::record::{CountryRow, GenreRow, LanguageRow};

/// Run the seeds stage.
pub fn run(config: &HarvestConfig, progress: SharedProgress) -> anyhow::Result<SeedsSummary> {
    let start = Instant::now();
    fs::create_dir_all(&config.data_dir).context("Cannot create data directory")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Cannot build fetch runtime")?;
    let api = TmdbApi::new(config).context("Cannot build API client")?;

    let mut summary = SeedsSummary::empty();

    let line = progress.stage_line("genres");
    let payload = require(runtime.block_on(api.genres()), "genre list")?;
    let rows: Vec<GenreRow> = payload
        .get("genres")
        .and_then(Value::as_array)
        .map(|genres| genres.iter().filter_map(GenreRow::from_payload).collect())
        .unwrap_or_default();
    anyhow::ensure!(!rows.is_empty(), "genre list came back empty");
    summary.genres_rows = write_seed(&config.genres_path(), &rows)?;
    line.finish_and_clear();

    if is_shutdown_requested() {
        return Ok(summary.interrupted_at(start));
    }

    let line = progress.stage_line("countries");
    let payload = require(runtime.block_on(api.countries()), "country list")?;
    let rows: Vec<CountryRow> = seed_rows(&payload, CountryRow::from_payload);
    anyhow::ensure!(!rows.is_empty(), "country list came back empty");
    summary.countries_rows = write_seed(&config.countries_path(), &rows)?;
    line.finish_and_clear();

    if is_shutdown_requested() {
        return Ok(summary.interrupted_at(start));
    }

    let line = progress.stage_line("languages");
    let payload = require(runtime.block_on(api.languages()), "language list")?;
    let rows: Vec<LanguageRow> = seed_rows(&payload, LanguageRow::from_payload);
    anyhow::ensure!(!rows.is_empty(), "language list came back empty");
    summary.languages_rows = write_seed(&config.languages_path(), &rows)?;
    line.finish_and_clear();

    summary.elapsed = start.elapsed();
    summary.log();
    Ok(summary)
}

fn require(outcome: FetchOutcome, what: &str) -> anyhow::Result<Value> {
    match outcome {
        FetchOutcome::Success(value) => Ok(value),
        FetchOutcome::Empty => anyhow::bail!("{what}: endpoint returned nothing"),
        FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
            Err(e).with_context(|| format!("Cannot fetch the {what}"))
        }
    }
}

/// Countries and languages arrive as bare top-level arrays.
fn seed_rows<T>(payload: &Value, from_payload: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    payload
        .as_array()
        .map(|entries| entries.iter().filter_map(from_payload).collect())
        .unwrap_or_default()
}

fn write_seed<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<usize> {
    let mut writer = BatchWriter::new(path, WriteMode::Fresh, true, rows.len().max(1));
    let written = writer
        .write_batch(rows)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("Cannot finalize {}", path.display()))?;
    Ok(written)
}

/// Summary of one seeds run.
#[derive(Debug)]
pub struct SeedsSummary {
    pub genres_rows: usize,
    pub countries_rows: usize,
    pub languages_rows: usize,
    pub interrupted: bool,
    pub elapsed: std::time::Duration,
}

impl SeedsSummary {
    pub fn empty() -> Self {
        Self {
            genres_rows: 0,
            countries_rows: 0,
            languages_rows: 0,
            interrupted: false,
            elapsed: std::time::Duration::ZERO,
        }
    }

    fn interrupted_at(mut self, start: Instant) -> Self {
        log::warn!("Shutdown requested, leaving the remaining seeds as they are");
        self.interrupted = true;
        self.elapsed = start.elapsed();
        self.log();
        self
    }

    pub fn log(&self) {
        log::info!("=== Seeds Summary ===");
        log::info!(
            "Rows: {} genres, {} countries, {} languages",
            self.genres_rows,
            self.countries_rows,
            self.languages_rows
        );
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.interrupted {
            log::warn!("Run was interrupted; some seeds were not refreshed");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn require_rejects_an_empty_outcome() {
        let err = require(FetchOutcome::Empty, "genre list").unwrap_err();
        assert!(err.to_string().contains("genre list"));
    }

    #[test]
    fn require_passes_a_payload_through() {
        let value = require(FetchOutcome::Success(json!({"genres": []})), "genre list").unwrap();
        assert_eq!(value, json!({"genres": []}));
    }

    #[test]
    fn seed_rows_from_a_bare_array() {
        let payload = json!([
            {"iso_3166_1": "FR", "english_name": "France", "native_name": "France"},
            {"english_name": "broken"}
        ]);
        let rows = seed_rows(&payload, CountryRow::from_payload);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].iso_3166_1, "FR");
    }

    #[test]
    fn seed_rows_from_a_non_array_are_empty() {
        let rows = seed_rows(&json!({"nope": 1}), CountryRow::from_payload);
        assert!(rows.is_empty());
    }

    #[test]
    fn write_seed_lands_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genres.csv");
        let rows = vec![
            GenreRow { id: 28, name: "Action".into() },
            GenreRow { id: 12, name: "Adventure".into() },
        ];

        assert_eq!(write_seed(&path, &rows).unwrap(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("\"id\",\"name\"\n"));
        assert!(content.contains("\"28\",\"Action\""));
    }

    #[test]
    fn seeds_summary_log_does_not_panic() {
        let summary = SeedsSummary {
            genres_rows: 19,
            countries_rows: 251,
            languages_rows: 187,
            interrupted: false,
            elapsed: std::time::Duration::from_secs(2),
        };
        summary.log();
        SeedsSummary::empty().log();
    }
}
