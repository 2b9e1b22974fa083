use std::path::PathBuf;

/// Configuration for the warehouse load.
pub struct LoadConfig {
    /// Directory holding the harvested CSV sinks
    pub data_dir: PathBuf,
    /// DuckDB database file to load into
    pub database: PathBuf,
    /// DuckDB memory limit (e.g. "4GB")
    pub memory_limit: String,
    /// DuckDB thread count
    pub threads: usize,
}
