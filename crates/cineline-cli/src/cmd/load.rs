//! `cineline load` - load the harvested sinks into DuckDB

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use cineline_core::fmt_num;

use crate::cmd::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// DuckDB database file to load into
    #[arg(long)]
    pub database: Option<PathBuf>,
}

pub fn run(args: LoadArgs, config: &Config) -> Result<ExitCode> {
    let mut load = config.load_config();
    if let Some(database) = args.database {
        load.database = database;
    }

    let summary = cineline_load::run(&load)?;

    let mut rows: Vec<(String, String)> = summary
        .tables
        .iter()
        .map(|(table, count)| (format!("raw.{table}"), fmt_num(*count as usize)))
        .collect();
    rows.push(("Total".into(), fmt_num(summary.total_rows() as usize)));
    print_summary("Load", rows);

    Ok(ExitCode::SUCCESS)
}
