//! cineline-load: harvested CSV sinks into a DuckDB warehouse
//!
//! Refreshes the `raw` schema wholesale from the data directory. Each
//! table is replaced in one statement, so the warehouse never holds a
//! partially loaded table.

mod config;
mod sql;

pub use config::LoadConfig;
pub use sql::RAW_TABLES;

use anyhow::{Context, Result};
use duckdb::Connection;

/// Summary statistics from the warehouse load.
#[derive(Debug)]
pub struct LoadSummary {
    /// Per-table row counts, in load order.
    pub tables: Vec<(String, u64)>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }

    pub fn log(&self) {
        log::info!("=== Load Summary ===");
        for (table, rows) in &self.tables {
            log::info!("raw.{table}: {rows} rows");
        }
        log::info!(
            "Total: {} rows across {} tables",
            self.total_rows(),
            self.tables.len()
        );
    }
}

/// Run the warehouse load.
pub fn run(config: &LoadConfig) -> Result<LoadSummary> {
    // Every sink must exist before anything is replaced; a missing one
    // means a harvest stage has not run yet.
    for entry in sql::RAW_TABLES {
        let sink = config.data_dir.join(entry.file);
        anyhow::ensure!(
            sink.exists(),
            "{} not found; run `cineline harvest {}` first",
            sink.display(),
            entry.stage
        );
    }

    if let Some(parent) = config.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
    }

    let conn = Connection::open(&config.database).with_context(|| {
        format!("Failed to open DuckDB database: {}", config.database.display())
    })?;

    conn.execute_batch(&format!(
        "SET memory_limit = '{}';
         SET threads = {};",
        config.memory_limit, config.threads,
    ))
    .context("Failed to configure DuckDB")?;

    conn.execute_batch(sql::create_raw_schema())
        .context("Failed to create raw schema")?;

    let mut tables = Vec::with_capacity(sql::RAW_TABLES.len());
    for entry in sql::RAW_TABLES {
        let sink = config.data_dir.join(entry.file);
        log::info!("Loading raw.{} from {}", entry.table, sink.display());
        conn.execute_batch(&sql::load_table(entry.table, &sink))
            .with_context(|| format!("Failed to load raw.{}", entry.table))?;

        let rows = conn
            .query_row(&sql::count_rows(entry.table), [], |row| {
                row.get::<_, i64>(0)
            })
            .with_context(|| format!("Failed to count raw.{}", entry.table))? as u64;
        tables.push((entry.table.to_string(), rows));
    }

    let summary = LoadSummary { tables };
    summary.log();
    log::info!("Done. Warehouse: {}", config.database.display());
    Ok(summary)
}
