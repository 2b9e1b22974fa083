//! SQL generation for the warehouse load.
//!
//! Every sink is loaded as a full refresh: `CREATE OR REPLACE TABLE`
//! gives truncate-then-load semantics in one statement, so a rerun
//! never leaves a half-replaced table behind.

use std::path::Path;

/// The raw tables, their source sinks, and the harvest stage that
/// produces each sink.
pub const RAW_TABLES: [RawTable; 7] = [
    RawTable { table: "movies", file: "movies.csv", stage: "discover" },
    RawTable { table: "movie_details", file: "movie_details.csv", stage: "details" },
    RawTable { table: "credits", file: "credits.csv", stage: "details" },
    RawTable { table: "people", file: "people.csv", stage: "people" },
    RawTable { table: "genres", file: "genres.csv", stage: "seeds" },
    RawTable { table: "countries", file: "countries.csv", stage: "seeds" },
    RawTable { table: "languages", file: "languages.csv", stage: "seeds" },
];

#[derive(Debug, Clone, Copy)]
pub struct RawTable {
    pub table: &'static str,
    pub file: &'static str,
    pub stage: &'static str,
}

/// Returns the SQL to create the raw schema.
pub fn create_raw_schema() -> &'static str {
    "CREATE SCHEMA IF NOT EXISTS raw"
}

/// Full refresh of one raw table from its CSV sink.
pub fn load_table(table: &str, csv: &Path) -> String {
    format!(
        "CREATE OR REPLACE TABLE raw.{table} AS \
         SELECT * FROM read_csv('{}', header = true)",
        csv.display()
    )
}

/// Row count of one raw table.
pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM raw.{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sink_maps_to_a_stage() {
        for entry in RAW_TABLES {
            assert!(!entry.stage.is_empty(), "{} has no stage", entry.table);
            assert!(entry.file.ends_with(".csv"));
        }
    }

    #[test]
    fn load_statement_targets_the_raw_schema() {
        let stmt = load_table("movies", Path::new("/data/movies.csv"));
        assert!(stmt.contains("CREATE OR REPLACE TABLE raw.movies"));
        assert!(stmt.contains("read_csv('/data/movies.csv'"));
    }
}
