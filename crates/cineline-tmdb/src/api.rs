//! TMDB v3 endpoint surface
//!
//! One [`TmdbApi`] per job wraps the shared fetcher and knows how to
//! spell each endpoint. The credential travels as a query parameter,
//! so request URLs never carry it and stay safe to log.

use cineline_core::{
    clamp_pages, FetchError, FetchOutcome, FetchRequest, Fetcher, PageFetch,
};
use indicatif::ProgressBar;

use crate::config::{DiscoverFilter, HarvestConfig};

pub struct TmdbApi {
    fetcher: Fetcher,
    base_url: String,
    api_key: String,
}

impl TmdbApi {
    pub fn new(config: &HarvestConfig) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(&config.rate, config.retry.clone(), config.timeout)?;
        Ok(Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Bind the discover endpoint to one year partition.
    pub fn discover_pages<'a>(
        &'a self,
        filter: &'a DiscoverFilter,
        year: i32,
        bar: ProgressBar,
    ) -> DiscoverPages<'a> {
        DiscoverPages {
            api: self,
            filter,
            year,
            bar,
        }
    }

    pub async fn movie_details(&self, movie_id: u64) -> FetchOutcome {
        let request = FetchRequest::new(
            format!("{}/movie/{movie_id}", self.base_url),
            format!("movie {movie_id}"),
        )
        .param("api_key", &self.api_key)
        .param("append_to_response", "credits");
        self.fetcher.fetch(&request).await
    }

    pub async fn person(&self, person_id: u64) -> FetchOutcome {
        let request = FetchRequest::new(
            format!("{}/person/{person_id}", self.base_url),
            format!("person {person_id}"),
        )
        .param("api_key", &self.api_key);
        self.fetcher.fetch(&request).await
    }

    pub async fn genres(&self) -> FetchOutcome {
        self.reference(format!("{}/genre/movie/list", self.base_url), "genres")
            .await
    }

    pub async fn countries(&self) -> FetchOutcome {
        self.reference(
            format!("{}/configuration/countries", self.base_url),
            "countries",
        )
        .await
    }

    pub async fn languages(&self) -> FetchOutcome {
        self.reference(
            format!("{}/configuration/languages", self.base_url),
            "languages",
        )
        .await
    }

    async fn reference(&self, url: String, label: &str) -> FetchOutcome {
        let request = FetchRequest::new(url, label).param("api_key", &self.api_key);
        self.fetcher.fetch(&request).await
    }

    fn discover_request(&self, filter: &DiscoverFilter, year: i32, page: u32) -> FetchRequest {
        FetchRequest::new(
            format!("{}/discover/movie", self.base_url),
            format!("year {year} page {page}"),
        )
        .param("api_key", &self.api_key)
        .param("primary_release_date.gte", format!("{year}-01-01"))
        .param("primary_release_date.lte", format!("{year}-12-31"))
        .param("include_adult", filter.include_adult)
        .param("vote_count.gte", filter.vote_count_gte)
        .param("sort_by", &filter.sort_by)
        .param("page", page)
    }
}

/// One year of the discover endpoint, walkable by the paginator.
///
/// Keeps the partition's progress bar current: pending until page 1
/// reports the extent, then a page counter.
pub struct DiscoverPages<'a> {
    api: &'a TmdbApi,
    filter: &'a DiscoverFilter,
    year: i32,
    bar: ProgressBar,
}

impl PageFetch for DiscoverPages<'_> {
    async fn fetch_page(&self, page: u32) -> FetchOutcome {
        let request = self.api.discover_request(self.filter, self.year, page);
        let outcome = self.api.fetcher.fetch(&request).await;

        if page == 1 {
            if let FetchOutcome::Success(payload) = &outcome {
                let reported = payload
                    .get("total_pages")
                    .and_then(|t| t.as_u64())
                    .unwrap_or(1) as u32;
                let (effective, _) = clamp_pages(reported, self.filter.max_pages);
                cineline_core::progress::upgrade_to_bar(&self.bar, u64::from(effective));
            }
        }
        self.bar.inc(1);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> TmdbApi {
        TmdbApi::new(&HarvestConfig {
            api_key: "secret".to_string(),
            ..HarvestConfig::default()
        })
        .unwrap()
    }

    fn param<'a>(request: &'a FetchRequest, key: &str) -> Option<&'a str> {
        request
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn discover_request_carries_the_year_window() {
        let api = api();
        let request = api.discover_request(&DiscoverFilter::default(), 2019, 3);

        assert_eq!(request.url, "https://api.themoviedb.org/3/discover/movie");
        assert_eq!(param(&request, "primary_release_date.gte"), Some("2019-01-01"));
        assert_eq!(param(&request, "primary_release_date.lte"), Some("2019-12-31"));
        assert_eq!(param(&request, "page"), Some("3"));
        assert_eq!(param(&request, "include_adult"), Some("false"));
        assert_eq!(param(&request, "vote_count.gte"), Some("10"));
        assert_eq!(param(&request, "sort_by"), Some("primary_release_date.asc"));
    }

    #[test]
    fn credential_stays_out_of_the_url() {
        let api = api();
        let request = api.discover_request(&DiscoverFilter::default(), 2019, 1);

        assert!(!request.url.contains("secret"));
        assert_eq!(param(&request, "api_key"), Some("secret"));
        assert!(!request.label.contains("secret"));
    }

    #[test]
    fn trailing_slash_in_base_url_is_trimmed() {
        let api = TmdbApi::new(&HarvestConfig {
            api_key: "k".to_string(),
            base_url: "https://api.themoviedb.org/3/".to_string(),
            ..HarvestConfig::default()
        })
        .unwrap();

        let request = api.discover_request(&DiscoverFilter::default(), 2020, 1);
        assert_eq!(request.url, "https://api.themoviedb.org/3/discover/movie");
    }
}
