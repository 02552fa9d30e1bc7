//! Boundary search over paginated listings
//!
//! A [`Locator`] drives a [`PageFetcher`] and a [`MarkerPredicate`] to find the
//! page where the listing marker shows up. Two strategies are offered:
//!
//! - [`Strategy::Linear`] walks forward one page at a time from the start URL
//!   and stops on the first page that has the marker.
//! - [`Strategy::Bisectional`] probes the ceiling page first (servers redirect
//!   out-of-range pages to their real last page), then bisects between page 1
//!   and that page for the lowest page that has the marker.
//!
//! The two are not drop-in replacements: linear depends on the start page and
//! never needs the ceiling, bisection ignores the start page and fails when the
//! ceiling page has no marker.

use crate::fetch::{FetchError, PageFetcher};
use crate::marker::MarkerPredicate;
use crate::page_url::{decode_page_number, encode_page_number, increment_page, FIRST_PAGE};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Highest page ever requested
pub const DEFAULT_CEILING: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Page-by-page scan from the start URL
    Linear,
    /// Ceiling probe followed by bisection
    #[default]
    Bisectional,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Bisectional => write!(f, "bisectional"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("page limit exceeded: page {page} is past the ceiling of {ceiling}")]
    PageLimitExceeded { page: u32, ceiling: u32 },

    #[error("unable to find: no marker on ceiling page {page}")]
    BoundaryNotFound { page: u32 },

    #[error("bisection stuck between pages {min_page} and {max_page}")]
    NotConverged { min_page: u32, max_page: u32 },
}

/// A resolved search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub url: String,
    pub page: u32,
    pub strategy: Strategy,
    /// Number of fetches the search made
    pub fetches: usize,
}

/// Bisection bracket
///
/// `max_page` has always been seen with the marker; `min_page` has been seen
/// without it, or is the unexplored first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBounds {
    pub min_page: u32,
    pub max_page: u32,
}

impl SearchBounds {
    pub fn new(max_page: u32) -> Self {
        Self {
            min_page: FIRST_PAGE,
            max_page: max_page.max(FIRST_PAGE),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.min_page == self.max_page
    }

    /// floor((min + max) / 2) without overflow
    pub fn midpoint(&self) -> u32 {
        self.min_page + (self.max_page - self.min_page) / 2
    }

    /// Narrow the bracket with the marker observation for the page the server
    /// actually returned
    pub fn observe(&mut self, page: u32, present: bool) {
        let page = page.clamp(self.min_page, self.max_page);
        if present {
            self.max_page = page;
        } else {
            self.min_page = page;
            // Midpoint of a one-page gap is min itself; close it upwards
            if self.max_page - self.min_page == 1 {
                self.min_page += 1;
            }
        }
    }
}

pub struct Locator<F, M> {
    fetcher: F,
    marker: M,
    ceiling: u32,
}

impl<F, M> Locator<F, M>
where
    F: PageFetcher,
    M: MarkerPredicate,
{
    pub fn new(fetcher: F, marker: M) -> Self {
        Self {
            fetcher,
            marker,
            ceiling: DEFAULT_CEILING,
        }
    }

    /// Override the ceiling page (at least 1)
    pub fn with_ceiling(mut self, ceiling: u32) -> Self {
        self.ceiling = ceiling.clamp(FIRST_PAGE, u32::MAX - 1);
        self
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Give the fetcher back, e.g. to shut a browser down
    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    /// Run the selected strategy from `url`
    pub async fn search(&self, strategy: Strategy, url: &str) -> Result<Located, LocateError> {
        match strategy {
            Strategy::Linear => self.linear(url).await,
            Strategy::Bisectional => self.bisectional(url).await,
        }
    }

    /// First page at or after the start page that shows the marker
    pub async fn linear(&self, url: &str) -> Result<Located, LocateError> {
        let mut url = url.to_string();
        let mut fetches = 0;

        loop {
            let page = decode_page_number(&url);
            if page > self.ceiling {
                return Err(LocateError::PageLimitExceeded {
                    page,
                    ceiling: self.ceiling,
                });
            }

            let (_, present) = self.inspect(&url).await?;
            fetches += 1;

            if present {
                log::info!("linear: marker on page {} after {} fetches", page, fetches);
                return Ok(Located {
                    url,
                    page,
                    strategy: Strategy::Linear,
                    fetches,
                });
            }

            url = increment_page(&url);
        }
    }

    /// Lowest page in `[1, ceiling]` that shows the marker, the ceiling being
    /// wherever the server redirects the probe
    pub async fn bisectional(&self, url: &str) -> Result<Located, LocateError> {
        let (landed, present) = self.inspect(&encode_page_number(url, self.ceiling)).await?;
        let mut fetches = 1;

        if !present {
            return Err(LocateError::BoundaryNotFound { page: landed });
        }

        let mut bounds = SearchBounds::new(landed.min(self.ceiling));
        log::debug!(
            "bisectional: ceiling {} landed on page {}",
            self.ceiling,
            bounds.max_page
        );

        // Each step shrinks a well-behaved bracket; a server that keeps
        // redirecting outside it cannot hold the search forever
        let mut steps = 0;
        while !bounds.is_settled() {
            if steps >= self.ceiling {
                return Err(LocateError::NotConverged {
                    min_page: bounds.min_page,
                    max_page: bounds.max_page,
                });
            }
            steps += 1;

            let mid = bounds.midpoint();
            let (landed, present) = self.inspect(&encode_page_number(url, mid)).await?;
            fetches += 1;

            bounds.observe(landed, present);
            log::trace!(
                "bisectional: page {} marker={} -> [{}, {}]",
                landed,
                present,
                bounds.min_page,
                bounds.max_page
            );
        }

        let page = bounds.min_page;
        log::info!("bisectional: marker on page {} after {} fetches", page, fetches);

        Ok(Located {
            url: encode_page_number(url, page),
            page,
            strategy: Strategy::Bisectional,
            fetches,
        })
    }

    /// Fetch a page and evaluate the marker: (page actually served, marker present)
    async fn inspect(&self, url: &str) -> Result<(u32, bool), FetchError> {
        log::debug!("fetching {}", url);
        let result = self.fetcher.fetch(url).await?;

        if result.final_url != url {
            log::debug!("{} redirected to {}", url, result.final_url);
        }

        let landed = decode_page_number(&result.final_url);
        Ok((landed, self.marker.has_marker(&result.content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResult;
    use crate::marker::HeaderMarker;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const LISTING: &str = "https://allegro.pl/kategoria/laptopy-491?order=p";

    /// In-memory listing: pages above `last_page` redirect to it
    struct Site {
        last_page: u32,
        marked: Box<dyn Fn(u32) -> bool + Send + Sync>,
        fail_on: Option<u32>,
        requested: Mutex<Vec<u32>>,
    }

    impl Site {
        fn new(last_page: u32, marked: impl Fn(u32) -> bool + Send + Sync + 'static) -> Self {
            Self {
                last_page,
                marked: Box::new(marked),
                fail_on: None,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, page: u32) -> Self {
            self.fail_on = Some(page);
            self
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for Site {
        async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
            let page = decode_page_number(url);
            self.requested.lock().unwrap().push(page);

            if self.fail_on == Some(page) {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: "connection reset".to_string(),
                });
            }

            let landed = page.min(self.last_page);
            let header = if (self.marked)(landed) {
                "Lista ofert"
            } else {
                "Oferty promowane"
            };

            Ok(FetchResult {
                final_url: if landed == page {
                    url.to_string()
                } else {
                    encode_page_number(url, landed)
                },
                content: format!("<html><body><h2>{}</h2></body></html>", header),
                status: 200,
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl PageFetcher for Unreachable {
        async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
            Err(FetchError::Transport {
                url: url.to_string(),
                reason: "dns error".to_string(),
            })
        }
    }

    fn locator(site: Site) -> Locator<Site, HeaderMarker> {
        Locator::new(site, HeaderMarker::default())
    }

    #[test]
    fn test_bounds_off_by_one_closes_upwards() {
        let mut bounds = SearchBounds {
            min_page: 5,
            max_page: 6,
        };
        assert_eq!(bounds.midpoint(), 5);
        bounds.observe(5, false);
        assert!(bounds.is_settled());
        assert_eq!(bounds.min_page, 6);
    }

    #[test]
    fn test_bounds_clamp_redirected_pages() {
        let mut bounds = SearchBounds::new(40);
        bounds.observe(70, false);
        assert_eq!(bounds, SearchBounds { min_page: 40, max_page: 40 });

        let mut bounds = SearchBounds::new(40);
        bounds.observe(20, true);
        assert_eq!(bounds, SearchBounds { min_page: 1, max_page: 20 });
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Linear.to_string(), "linear");
        assert_eq!(Strategy::default(), Strategy::Bisectional);
    }

    #[tokio::test]
    async fn test_linear_returns_start_url_when_marked() {
        // Marker on pages 1..=13, everything past 13 redirects to 13
        let locator = locator(Site::new(13, |page| page <= 13));
        let found = locator.linear(LISTING).await.unwrap();

        assert_eq!(found.url, LISTING);
        assert_eq!(found.page, 1);
        assert_eq!(found.fetches, 1);
    }

    #[tokio::test]
    async fn test_linear_walks_to_first_marked_page() {
        let locator = locator(Site::new(40, |page| page >= 13));
        let found = locator.linear(LISTING).await.unwrap();

        assert_eq!(found.url, format!("{}&p=13", LISTING));
        assert_eq!(found.page, 13);
        assert_eq!(found.fetches, 13);
        assert_eq!(locator.fetcher().requested(), (1..=13).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_linear_gives_up_past_ceiling() {
        let locator = locator(Site::new(500, |_| false));
        let err = locator.linear(LISTING).await.unwrap_err();

        assert!(matches!(
            err,
            LocateError::PageLimitExceeded {
                page: 101,
                ceiling: 100
            }
        ));
        assert_eq!(locator.fetcher().requested().len(), 100);
    }

    #[tokio::test]
    async fn test_linear_start_past_ceiling_does_not_fetch() {
        let locator = locator(Site::new(500, |_| true));
        let err = locator
            .linear(&format!("{}&p=101", LISTING))
            .await
            .unwrap_err();

        assert!(matches!(err, LocateError::PageLimitExceeded { .. }));
        assert!(locator.fetcher().requested().is_empty());
    }

    #[tokio::test]
    async fn test_bisectional_finds_boundary() {
        let locator = locator(Site::new(40, |page| page >= 13));
        let found = locator.bisectional(LISTING).await.unwrap();

        assert_eq!(found.url, format!("{}&p=13", LISTING));
        assert_eq!(found.page, 13);
        assert_eq!(found.fetches, 7);
        assert_eq!(
            locator.fetcher().requested(),
            vec![100, 20, 10, 15, 12, 13, 12]
        );
    }

    #[tokio::test]
    async fn test_bisectional_every_boundary() {
        for boundary in 1..=100 {
            let locator = locator(Site::new(100, move |page| page >= boundary));
            let found = locator.bisectional(LISTING).await.unwrap();

            assert_eq!(found.page, boundary);
            assert_eq!(decode_page_number(&found.url), boundary);
            assert!(found.fetches <= 9, "boundary {} took {}", boundary, found.fetches);
        }
    }

    #[tokio::test]
    async fn test_bisectional_closes_one_page_gap() {
        let locator = locator(Site::new(100, |page| page >= 6));
        let found = locator.bisectional(LISTING).await.unwrap();

        assert_eq!(found.page, 6);
        // Bracket (5, 6) with no marker on 5 settles on 6 without refetching 6
        assert_eq!(
            locator.fetcher().requested(),
            vec![100, 50, 25, 13, 7, 4, 5, 6, 5]
        );
    }

    #[tokio::test]
    async fn test_bisectional_ceiling_without_marker() {
        let locator = locator(Site::new(100, |page| page <= 13));
        let err = locator.bisectional(LISTING).await.unwrap_err();

        assert!(matches!(err, LocateError::BoundaryNotFound { page: 100 }));
        assert_eq!(locator.fetcher().requested(), vec![100]);
    }

    #[tokio::test]
    async fn test_bisectional_ceiling_redirects_to_first_page() {
        let locator = locator(Site::new(1, |_| true));
        let found = locator.bisectional(LISTING).await.unwrap();

        assert_eq!(found.page, 1);
        assert_eq!(found.url, format!("{}&p=1", LISTING));
        assert_eq!(found.fetches, 1);
    }

    #[tokio::test]
    async fn test_bisectional_ignores_start_page() {
        let locator = locator(Site::new(40, |page| page >= 13));
        let found = locator
            .bisectional(&format!("{}&p=30", LISTING))
            .await
            .unwrap();

        assert_eq!(found.url, format!("{}&p=13", LISTING));
    }

    #[tokio::test]
    async fn test_strategies_diverge() {
        // Starting past the boundary: linear stays put, bisection goes back
        let start = format!("{}&p=20", LISTING);

        let linear = locator(Site::new(40, |page| page >= 13))
            .search(Strategy::Linear, &start)
            .await
            .unwrap();
        let bisectional = locator(Site::new(40, |page| page >= 13))
            .search(Strategy::Bisectional, &start)
            .await
            .unwrap();

        assert_eq!(linear.page, 20);
        assert_eq!(linear.strategy, Strategy::Linear);
        assert_eq!(bisectional.page, 13);
        assert_eq!(bisectional.strategy, Strategy::Bisectional);
    }

    #[tokio::test]
    async fn test_custom_ceiling() {
        let locator = locator(Site::new(500, |page| page >= 300)).with_ceiling(400);
        let found = locator.bisectional(LISTING).await.unwrap();
        assert_eq!(found.page, 300);
        assert_eq!(locator.fetcher().requested()[0], 400);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_bisection() {
        let locator = locator(Site::new(40, |page| page >= 13).failing_on(10));
        let err = locator.bisectional(LISTING).await.unwrap_err();

        assert!(matches!(err, LocateError::Fetch(FetchError::Transport { .. })));
        assert_eq!(locator.fetcher().requested(), vec![100, 20, 10]);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_linear() {
        let locator = locator(Site::new(40, |page| page >= 13).failing_on(3));
        let err = locator.linear(LISTING).await.unwrap_err();

        assert!(matches!(err, LocateError::Fetch(_)));
        assert_eq!(locator.fetcher().requested(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unreachable_fetcher_rejects_both() {
        let locator = Locator::new(Unreachable, HeaderMarker::default());
        for strategy in [Strategy::Linear, Strategy::Bisectional] {
            let err = locator.search(strategy, LISTING).await.unwrap_err();
            assert!(matches!(err, LocateError::Fetch(FetchError::Transport { .. })));
        }
    }

    #[tokio::test]
    async fn test_bisectional_gives_up_on_misbehaving_server() {
        // Ceiling has the marker, every other request bounces to unmarked page 1
        let marker = |content: &str| content.contains("p=100");
        struct Bouncer;

        #[async_trait]
        impl PageFetcher for Bouncer {
            async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
                let page = decode_page_number(url);
                let final_url = if page == 100 {
                    url.to_string()
                } else {
                    encode_page_number(url, 1)
                };
                Ok(FetchResult {
                    content: final_url.clone(),
                    final_url,
                    status: 200,
                })
            }
        }

        let locator = Locator::new(Bouncer, marker);
        let err = locator.bisectional(LISTING).await.unwrap_err();
        assert!(matches!(
            err,
            LocateError::NotConverged {
                min_page: 1,
                max_page: 100
            }
        ));
    }
}
