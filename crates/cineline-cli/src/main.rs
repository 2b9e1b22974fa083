//! cineline - resumable TMDB harvester
//!
//! Harvests the TMDB movie catalog into CSV sinks and loads them
//! into a DuckDB warehouse. Every harvest stage can be interrupted
//! and rerun; only missing work is fetched again.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};

use cineline_core::shutdown_flag;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "cineline")]
#[command(about = "Resumable TMDB catalog harvester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file path (default: ./cineline.toml or ~/.config/cineline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Directory holding the CSV sinks
    #[arg(long, global = true)]
    data_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single harvest stage
    Harvest(cmd::harvest::HarvestArgs),
    /// Load the harvested sinks into the DuckDB warehouse
    Load(cmd::load::LoadArgs),
    /// Run the full pipeline: discover, details, people, seeds, load
    Run(cmd::run::RunArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(cineline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — progress bars show activity
    //   non-TTY: info unless --debug          — logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug);
    cineline_core::init_logging(quiet, cli.debug, multi);

    setup_signal_handler();

    // Load configuration
    let loaded = if let Some(ref path) = cli.config {
        Config::from_file(path)
    } else {
        Config::load()
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };
    if let Some(dir) = cli.data_dir {
        config.paths.data_dir = dir;
    }

    let result = match cli.command {
        Command::Harvest(args) => cmd::harvest::run(args, &config, &progress),
        Command::Load(args) => cmd::load::run(args, &config),
        Command::Run(args) => cmd::run::run(args, &config, &progress),
        Command::Config => {
            show_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn show_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Data directory",
        &config.paths.data_dir.display().to_string(),
    ]);
    table.add_row(vec!["API base URL", &config.api.base_url]);
    table.add_row(vec![
        "API key",
        if config.api.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec![
        "Rate budget",
        &format!(
            "{} req / {}ms, {} in flight",
            config.rate.requests_per_window, config.rate.window_ms, config.rate.max_in_flight
        ),
    ]);
    table.add_row(vec![
        "Retry",
        &format!(
            "{} attempts, {}..{}ms backoff",
            config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
        ),
    ]);
    table.add_row(vec![
        "Years",
        &format!(
            "{}..={}",
            config.discover.start_year, config.discover.end_year
        ),
    ]);
    table.add_row(vec![
        "Vote floor",
        &config.discover.vote_count_gte.to_string(),
    ]);
    table.add_row(vec!["Batch size", &config.ingest.batch_size.to_string()]);
    table.add_row(vec![
        "Resume",
        match config.ingest.resume {
            cineline_core::ResumePolicy::Append => "append",
            cineline_core::ResumePolicy::Fresh => "fresh",
        },
    ]);
    table.add_row(vec![
        "Database",
        &config.load.database.display().to_string(),
    ]);

    eprintln!("\n{table}");
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit (default SIGINT behavior restored)
    // SAFETY: AtomicBool::store and process::exit are async-signal-safe
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGTERM, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGTERM handler");
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            if shutdown_flag().swap(true, Ordering::Relaxed) {
                std::process::exit(130);
            }
        })
        .expect("Failed to register SIGINT handler");
    }
}
