//! Harvest configuration

use std::path::PathBuf;
use std::time::Duration;

use cineline_core::{RateBudget, ResumePolicy, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Year-partitioned discovery filter.
///
/// The discover endpoint caps pagination, so one query per calendar
/// year keeps each partition under the cap for any reasonable vote
/// floor. The sort keeps page contents stable while pages are walked.
#[derive(Debug, Clone)]
pub struct DiscoverFilter {
    pub start_year: i32,
    pub end_year: i32,
    /// Floor on vote_count, filtering out obscure entries.
    pub vote_count_gte: u32,
    pub include_adult: bool,
    pub sort_by: String,
    /// Pages the provider will actually serve per query.
    pub max_pages: u32,
}

impl Default for DiscoverFilter {
    fn default() -> Self {
        Self {
            start_year: 2000,
            end_year: 2025,
            vote_count_gte: 10,
            include_adult: false,
            sort_by: "primary_release_date.asc".to_string(),
            max_pages: 500,
        }
    }
}

/// Runtime configuration shared by every harvest stage.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub api_key: String,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub timeout: Duration,
    pub rate: RateBudget,
    pub retry: RetryPolicy,
    pub discover: DiscoverFilter,
    /// Ids fetched and rows flushed per write.
    pub batch_size: usize,
    pub resume: ResumePolicy,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            timeout: Duration::from_secs(30),
            rate: RateBudget::default(),
            retry: RetryPolicy::default(),
            discover: DiscoverFilter::default(),
            batch_size: 500,
            resume: ResumePolicy::Append,
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.api_key.is_empty(),
            "TMDB API key is empty; set TMDB_API_KEY or api.api_key"
        );
        anyhow::ensure!(
            self.discover.start_year <= self.discover.end_year,
            "discover.start_year {} is after end_year {}",
            self.discover.start_year,
            self.discover.end_year
        );
        anyhow::ensure!(self.batch_size > 0, "ingest.batch_size must be positive");
        Ok(())
    }

    pub fn movies_path(&self) -> PathBuf {
        self.data_dir.join("movies.csv")
    }

    pub fn details_path(&self) -> PathBuf {
        self.data_dir.join("movie_details.csv")
    }

    pub fn credits_path(&self) -> PathBuf {
        self.data_dir.join("credits.csv")
    }

    pub fn people_path(&self) -> PathBuf {
        self.data_dir.join("people.csv")
    }

    pub fn genres_path(&self) -> PathBuf {
        self.data_dir.join("genres.csv")
    }

    pub fn countries_path(&self) -> PathBuf {
        self.data_dir.join("countries.csv")
    }

    pub fn languages_path(&self) -> PathBuf {
        self.data_dir.join("languages.csv")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> HarvestConfig {
        HarvestConfig {
            api_key: "k".to_string(),
            ..HarvestConfig::default()
        }
    }

    #[test]
    fn defaults_are_usable() {
        let config = HarvestConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.discover.max_pages, 500);
        assert_eq!(config.discover.sort_by, "primary_release_date.asc");
        assert_eq!(config.resume, ResumePolicy::Append);
    }

    #[test]
    fn sink_paths_live_under_data_dir() {
        let config = HarvestConfig {
            data_dir: PathBuf::from("/tmp/cineline"),
            ..HarvestConfig::default()
        };
        assert_eq!(config.movies_path(), PathBuf::from("/tmp/cineline/movies.csv"));
        assert_eq!(
            config.details_path(),
            PathBuf::from("/tmp/cineline/movie_details.csv")
        );
    }

    #[test]
    fn missing_api_key_fails_validation() {
        assert!(HarvestConfig::default().validate().is_err());
        assert!(keyed().validate().is_ok());
    }

    #[test]
    fn inverted_year_range_fails_validation() {
        let mut config = keyed();
        config.discover.start_year = 2024;
        config.discover.end_year = 2020;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let mut config = keyed();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
