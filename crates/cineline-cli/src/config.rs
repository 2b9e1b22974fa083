//! Configuration loading from TOML files

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use cineline_core::{RateBudget, ResumePolicy, RetryPolicy};
use cineline_tmdb::{DiscoverFilter, HarvestConfig};
use serde::Deserialize;

/// Global configuration for cineline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub rate: RateConfig,
    pub retry: RetryConfig,
    pub discover: DiscoverConfig,
    pub ingest: IngestConfig,
    pub paths: PathsConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: cineline_tmdb::config::DEFAULT_BASE_URL.to_string(),
            api_key: std::env::var("TMDB_API_KEY").ok(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub requests_per_window: usize,
    pub window_ms: u64,
    pub max_in_flight: usize,
}

impl Default for RateConfig {
    fn default() -> Self {
        let budget = RateBudget::default();
        Self {
            requests_per_window: budget.window_requests,
            window_ms: budget.window.as_millis() as u64,
            max_in_flight: budget.max_in_flight,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retry_empty: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            retry_empty: policy.retry_empty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    pub start_year: i32,
    pub end_year: i32,
    pub vote_count_gte: u32,
    pub include_adult: bool,
    pub sort_by: String,
    pub max_pages: u32,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        let filter = DiscoverFilter::default();
        Self {
            start_year: filter.start_year,
            end_year: filter.end_year,
            vote_count_gte: filter.vote_count_gte,
            include_adult: filter.include_adult,
            sort_by: filter.sort_by,
            max_pages: filter.max_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub resume: ResumePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            resume: ResumePolicy::Append,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub database: PathBuf,
    pub memory_limit: String,
    pub threads: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/cineline.duckdb"),
            memory_limit: "4GB".to_string(),
            threads: 4,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./cineline.toml (current directory)
    /// 2. ~/.config/cineline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("cineline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "cineline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Assemble the harvest configuration the stage runners take.
    pub fn harvest_config(&self) -> Result<HarvestConfig> {
        let api_key = self
            .api
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("No API key: set TMDB_API_KEY or api.api_key in cineline.toml")?;

        let config = HarvestConfig {
            api_key,
            base_url: self.api.base_url.clone(),
            data_dir: self.paths.data_dir.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            rate: RateBudget {
                window_requests: self.rate.requests_per_window,
                window: Duration::from_millis(self.rate.window_ms),
                max_in_flight: self.rate.max_in_flight,
            },
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                retry_empty: self.retry.retry_empty,
            },
            discover: DiscoverFilter {
                start_year: self.discover.start_year,
                end_year: self.discover.end_year,
                vote_count_gte: self.discover.vote_count_gte,
                include_adult: self.discover.include_adult,
                sort_by: self.discover.sort_by.clone(),
                max_pages: self.discover.max_pages,
            },
            batch_size: self.ingest.batch_size,
            resume: self.ingest.resume,
        };
        config.validate()?;
        Ok(config)
    }

    /// Assemble the warehouse load configuration.
    pub fn load_config(&self) -> cineline_load::LoadConfig {
        cineline_load::LoadConfig {
            data_dir: self.paths.data_dir.clone(),
            database: self.load.database.clone(),
            memory_limit: self.load.memory_limit.clone(),
            threads: self.load.threads,
        }
    }
}
