//! Page fetching: one network round trip per call
//!
//! The locator only sees the [`PageFetcher`] trait. Two backends implement it:
//! [`HttpFetcher`] (plain HTTP via reqwest) and
//! [`BrowserFetcher`](crate::browser::BrowserFetcher) (headless Chrome).

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Default user agent; some listing sites reject obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// URL after following redirects
    pub final_url: String,
    /// Response body (HTML)
    pub content: String,
    pub status: u16,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch capability unavailable: {0}")]
    Unavailable(String),

    #[error("transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },
}

/// Fetch capability consumed by the locator
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieve `url` once: no retries, no caching
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for Box<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        (**self).fetch(url).await
    }
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        (**self).fetch(url).await
    }
}

/// Plain HTTP backend
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client that follows redirects (reqwest default policy)
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content = response.text().await.map_err(transport)?;

        Ok(FetchResult {
            final_url,
            content,
            status: status.as_u16(),
        })
    }
}

/// Wraps a fetcher and counts the calls made through it
pub struct CountingFetcher<F> {
    inner: F,
    calls: AtomicUsize,
}

impl<F> CountingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for CountingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(url).await
    }
}
