//! `cineline run` - the whole pipeline in stage order

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use cineline_core::{ResumePolicy, SharedProgress, fmt_num, is_shutdown_requested};

use crate::config::Config;

const STAGES: usize = 5;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// First release year to cover
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Last release year to cover
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Keep only movies with at least this many votes
    #[arg(long)]
    pub vote_count_gte: Option<u32>,

    /// Ids per fetch round and rows per sink write
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Discard the sinks and harvest everything again
    #[arg(long)]
    pub fresh: bool,

    /// DuckDB database file to load into
    #[arg(long)]
    pub database: Option<PathBuf>,
}

struct StageResult {
    name: &'static str,
    outcome: String,
    secs: f64,
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let started = Instant::now();

    let mut harvest = config.harvest_config()?;
    if let Some(year) = args.start_year {
        harvest.discover.start_year = year;
    }
    if let Some(year) = args.end_year {
        harvest.discover.end_year = year;
    }
    if let Some(votes) = args.vote_count_gte {
        harvest.discover.vote_count_gte = votes;
    }
    if let Some(size) = args.batch_size {
        harvest.batch_size = size;
    }
    if args.fresh {
        harvest.resume = ResumePolicy::Fresh;
    }
    harvest.validate()?;

    let mut load = config.load_config();
    if let Some(database) = args.database {
        load.database = database;
    }

    log::info!(
        "Pipeline: {} stages, years {}..={}, data dir {}",
        STAGES,
        harvest.discover.start_year,
        harvest.discover.end_year,
        harvest.data_dir.display()
    );

    let mut results: Vec<StageResult> = Vec::new();

    banner(1, "discover");
    let step = Instant::now();
    let discover =
        cineline_tmdb::discover::run(&harvest, progress.clone()).context("discover stage failed")?;
    results.push(StageResult {
        name: "discover",
        outcome: format!(
            "{} movies, {}/{} years",
            fmt_num(discover.rows_written),
            discover.years_done,
            discover.years_total
        ),
        secs: step.elapsed().as_secs_f64(),
    });
    if discover.interrupted || is_shutdown_requested() {
        return finish(results, started, true);
    }

    banner(2, "details");
    let step = Instant::now();
    let details =
        cineline_tmdb::details::run(&harvest, progress.clone()).context("details stage failed")?;
    results.push(StageResult {
        name: "details",
        outcome: format!(
            "{} fetched, {} already on disk",
            fmt_num(details.fetched),
            fmt_num(details.already_present)
        ),
        secs: step.elapsed().as_secs_f64(),
    });
    if details.interrupted || is_shutdown_requested() {
        return finish(results, started, true);
    }

    banner(3, "people");
    let step = Instant::now();
    let people =
        cineline_tmdb::people::run(&harvest, progress.clone()).context("people stage failed")?;
    results.push(StageResult {
        name: "people",
        outcome: format!(
            "{} fetched, {} already on disk",
            fmt_num(people.fetched),
            fmt_num(people.already_present)
        ),
        secs: step.elapsed().as_secs_f64(),
    });
    if people.interrupted || is_shutdown_requested() {
        return finish(results, started, true);
    }

    banner(4, "seeds");
    let step = Instant::now();
    let seeds =
        cineline_tmdb::seeds::run(&harvest, progress.clone()).context("seeds stage failed")?;
    results.push(StageResult {
        name: "seeds",
        outcome: format!(
            "{} genres, {} countries, {} languages",
            seeds.genres_rows, seeds.countries_rows, seeds.languages_rows
        ),
        secs: step.elapsed().as_secs_f64(),
    });
    if seeds.interrupted || is_shutdown_requested() {
        return finish(results, started, true);
    }

    banner(5, "load");
    let step = Instant::now();
    let loaded = cineline_load::run(&load).context("load stage failed")?;
    results.push(StageResult {
        name: "load",
        outcome: format!(
            "{} rows in {} tables",
            fmt_num(loaded.total_rows() as usize),
            loaded.tables.len()
        ),
        secs: step.elapsed().as_secs_f64(),
    });

    finish(results, started, false)
}

fn banner(step: usize, name: &str) {
    println!("\n=== Step {step}/{STAGES}: {name} ===");
}

fn finish(results: Vec<StageResult>, started: Instant, interrupted: bool) -> Result<ExitCode> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Stage").fg(Color::Cyan),
            Cell::new("Result").fg(Color::Cyan),
            Cell::new("Time").fg(Color::Cyan),
        ]);
    for result in &results {
        table.add_row(vec![
            Cell::new(result.name),
            Cell::new(&result.outcome),
            Cell::new(format!("{:.1}s", result.secs)),
        ]);
    }
    eprintln!("\n{table}");

    if interrupted {
        log::warn!("Pipeline interrupted; rerun `cineline run` to resume");
        Ok(ExitCode::from(130))
    } else {
        println!("Total time: {:.2} min", started.elapsed().as_secs_f64() / 60.0);
        Ok(ExitCode::SUCCESS)
    }
}
