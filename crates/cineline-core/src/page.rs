//! Page walking for endpoints that report their own extent
//!
//! Paged endpoints answer every request with the same envelope: a
//! `results` array plus a `total_pages` count. The first page is
//! fetched alone to learn the extent, the rest fan out concurrently.

use futures_util::{stream, StreamExt};

use crate::error::FetchError;
use crate::fetch::FetchOutcome;

/// One paged source, usually an endpoint bound to a fixed query.
///
/// Callers poll the returned futures in place, so implementations do
/// not need `Send` bounds.
#[allow(async_fn_in_trait)]
pub trait PageFetch {
    async fn fetch_page(&self, page: u32) -> FetchOutcome;
}

/// Everything one partition of a paged endpoint yielded.
#[derive(Debug)]
pub struct PartitionPages {
    pub rows: Vec<serde_json::Value>,
    /// Pages actually walked, after the provider cap.
    pub pages_planned: u32,
    /// Pages skipped after their fetch resolved as a failure.
    pub pages_failed: u32,
    /// Pages that resolved but carried no rows.
    pub pages_empty: u32,
    pub clamped: bool,
}

impl PartitionPages {
    pub fn into_rows(self) -> Vec<serde_json::Value> {
        self.rows
    }

    fn empty() -> Self {
        Self {
            rows: Vec::new(),
            pages_planned: 1,
            pages_failed: 0,
            pages_empty: 1,
            clamped: false,
        }
    }
}

/// Cap the reported page count at what the provider will actually
/// serve. Returns the effective count and whether it was cut down.
pub fn clamp_pages(reported: u32, max: u32) -> (u32, bool) {
    let reported = reported.max(1);
    (reported.min(max), reported > max)
}

/// Extract the row array and reported extent from a paged envelope.
fn parse_envelope(value: serde_json::Value) -> (Vec<serde_json::Value>, u32) {
    let total = value
        .get("total_pages")
        .and_then(|t| t.as_u64())
        .unwrap_or(1) as u32;
    let rows = match value {
        serde_json::Value::Object(mut map) => match map.remove("results") {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    (rows, total)
}

pub struct Paginator {
    fan_out: usize,
    max_pages: u32,
}

impl Paginator {
    pub fn new(fan_out: usize, max_pages: u32) -> Self {
        Self {
            fan_out: fan_out.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Walk every page of one partition.
    ///
    /// The first page is authoritative: its failure fails the whole
    /// partition. Later pages are individually skippable; a skip is
    /// logged and counted but never aborts the walk.
    pub async fn collect<P: PageFetch>(
        &self,
        source: &P,
        label: &str,
    ) -> Result<PartitionPages, FetchError> {
        let first = match source.fetch_page(1).await {
            FetchOutcome::Success(value) => value,
            FetchOutcome::Empty => {
                log::debug!("{label}: no results");
                return Ok(PartitionPages::empty());
            }
            FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                return Err(e);
            }
        };

        let (mut rows, reported) = parse_envelope(first);
        let (effective, clamped) = clamp_pages(reported, self.max_pages);
        if clamped {
            log::warn!("{label}: {reported} pages reported, fetching the first {effective}");
        }

        let mut pages_failed = 0u32;
        let mut pages_empty = 0u32;
        if effective >= 2 {
            let mut pages = stream::iter((2..=effective).map(|page| async move {
                (page, source.fetch_page(page).await)
            }))
            .buffer_unordered(self.fan_out);

            while let Some((page, outcome)) = pages.next().await {
                match outcome {
                    FetchOutcome::Success(value) => {
                        let (mut page_rows, _) = parse_envelope(value);
                        if page_rows.is_empty() {
                            pages_empty += 1;
                        }
                        rows.append(&mut page_rows);
                    }
                    FetchOutcome::Empty => {
                        log::debug!("{label}: page {page} empty");
                        pages_empty += 1;
                    }
                    FetchOutcome::TransientFailure(e) | FetchOutcome::PermanentFailure(e) => {
                        log::warn!("{label}: page {page} skipped: {e}");
                        pages_failed += 1;
                    }
                }
            }
        }

        Ok(PartitionPages {
            rows,
            pages_planned: effective,
            pages_failed,
            pages_empty,
            clamped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct ScriptedPages {
        total_pages: u32,
        rows_per_page: usize,
        failing: HashSet<u32>,
        empty: HashSet<u32>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedPages {
        fn new(total_pages: u32, rows_per_page: usize) -> Self {
            Self {
                total_pages,
                rows_per_page,
                failing: HashSet::new(),
                empty: HashSet::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, pages: &[u32]) -> Self {
            self.failing = pages.iter().copied().collect();
            self
        }

        fn empty_on(mut self, pages: &[u32]) -> Self {
            self.empty = pages.iter().copied().collect();
            self
        }

        fn requested_sorted(&self) -> Vec<u32> {
            let mut pages = self.requested.lock().unwrap().clone();
            pages.sort_unstable();
            pages
        }
    }

    impl PageFetch for ScriptedPages {
        async fn fetch_page(&self, page: u32) -> FetchOutcome {
            self.requested.lock().unwrap().push(page);
            if self.failing.contains(&page) {
                return FetchOutcome::PermanentFailure(FetchError::Http {
                    status: 500,
                    message: "scripted".into(),
                });
            }
            if self.empty.contains(&page) {
                return FetchOutcome::Empty;
            }
            let rows: Vec<serde_json::Value> = (0..self.rows_per_page)
                .map(|i| serde_json::json!({"id": u64::from(page) * 1000 + i as u64}))
                .collect();
            FetchOutcome::Success(serde_json::json!({
                "page": page,
                "total_pages": self.total_pages,
                "total_results": self.total_pages * self.rows_per_page as u32,
                "results": rows,
            }))
        }
    }

    #[test]
    fn clamp_passes_small_counts_through() {
        assert_eq!(clamp_pages(3, 500), (3, false));
        assert_eq!(clamp_pages(500, 500), (500, false));
    }

    #[test]
    fn clamp_cuts_down_oversized_counts() {
        assert_eq!(clamp_pages(750, 500), (500, true));
        assert_eq!(clamp_pages(501, 500), (500, true));
    }

    #[test]
    fn clamp_treats_zero_as_one_page() {
        assert_eq!(clamp_pages(0, 500), (1, false));
    }

    #[tokio::test]
    async fn collects_every_page_exactly_once() {
        let source = ScriptedPages::new(4, 2);
        let pages = Paginator::new(3, 500)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(source.requested_sorted(), vec![1, 2, 3, 4]);
        assert_eq!(pages.rows.len(), 8);
        assert_eq!(pages.pages_planned, 4);
        assert_eq!(pages.pages_failed, 0);
        assert!(!pages.clamped);
    }

    #[tokio::test]
    async fn single_page_source_stops_after_the_first() {
        let source = ScriptedPages::new(1, 5);
        let pages = Paginator::new(8, 500)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(source.requested_sorted(), vec![1]);
        assert_eq!(pages.into_rows().len(), 5);
    }

    #[tokio::test]
    async fn oversized_source_is_clamped() {
        let source = ScriptedPages::new(750, 1);
        let pages = Paginator::new(4, 5)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(source.requested_sorted(), vec![1, 2, 3, 4, 5]);
        assert_eq!(pages.pages_planned, 5);
        assert!(pages.clamped);
    }

    #[tokio::test]
    async fn failed_page_is_skipped_not_fatal() {
        let source = ScriptedPages::new(3, 2).failing(&[2]);
        let pages = Paginator::new(2, 500)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(source.requested_sorted(), vec![1, 2, 3]);
        assert_eq!(pages.rows.len(), 4);
        assert_eq!(pages.pages_failed, 1);
    }

    #[tokio::test]
    async fn failed_first_page_fails_the_partition() {
        let source = ScriptedPages::new(3, 2).failing(&[1]);
        let result = Paginator::new(2, 500).collect(&source, "year 2020").await;

        assert!(result.is_err());
        assert_eq!(source.requested_sorted(), vec![1]);
    }

    #[tokio::test]
    async fn empty_first_page_yields_no_rows() {
        let source = ScriptedPages::new(3, 2).empty_on(&[1]);
        let pages = Paginator::new(2, 500)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(source.requested_sorted(), vec![1]);
        assert!(pages.rows.is_empty());
        assert_eq!(pages.pages_failed, 0);
    }

    #[tokio::test]
    async fn later_empty_pages_are_counted_separately_from_failures() {
        let source = ScriptedPages::new(3, 2).empty_on(&[3]);
        let pages = Paginator::new(2, 500)
            .collect(&source, "year 2020")
            .await
            .unwrap();

        assert_eq!(pages.rows.len(), 4);
        assert_eq!(pages.pages_failed, 0);
        assert_eq!(pages.pages_empty, 1);
    }
}
