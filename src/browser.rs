//! Headless Chrome fetch backend via chromiumoxide
//!
//! For listing sites that serve bot walls to plain HTTP clients. Each fetch
//! opens a fresh tab; the browser is launched once per fetcher.

use crate::fetch::{FetchError, FetchResult, PageFetcher};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;

pub struct BrowserFetcher {
    browser: Browser,
    user_agent: String,
    timeout: Duration,
}

impl BrowserFetcher {
    /// Launch Chrome; fails with [`FetchError::Unavailable`] if it is not installed
    pub async fn launch(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--headless=new")
            .build()
            .map_err(|e| FetchError::Unavailable(format!("browser config error: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            FetchError::Unavailable(format!(
                "failed to launch Chrome ({}). Is Chrome/Chromium installed?",
                e
            ))
        })?;

        // Spawn handler in background
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser,
            user_agent: user_agent.to_string(),
            timeout,
        })
    }

    /// Close the browser
    pub async fn close(mut self) -> Result<(), FetchError> {
        self.browser
            .close()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn open_tab(&self, url: &str) -> Result<Page, FetchError> {
        let transport = |e: chromiumoxide::error::CdpError| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(transport)?;

        page.execute(
            chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams::new(
                &self.user_agent,
            ),
        )
        .await
        .map_err(transport)?;

        Ok(page)
    }

    async fn load(&self, page: &Page, url: &str) -> Result<FetchResult, FetchError> {
        let navigation = tokio::time::timeout(self.timeout, page.goto(url)).await;

        match navigation {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: describe_error(&e.to_string()),
                })
            }
            Err(_) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    reason: "Navigation timeout".to_string(),
                })
            }
        }

        let title = page.get_title().await.ok().flatten();
        let status = status_from_title(title.as_deref());
        if status != 200 {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }

        let content = page.content().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // Current URL reflects redirects
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(FetchResult {
            final_url,
            content,
            status,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let page = self.open_tab(url).await?;
        let result = self.load(&page, url).await;

        if let Err(e) = page.close().await {
            log::debug!("failed to close tab for {}: {}", url, e);
        }

        result
    }
}

/// chromiumoxide doesn't expose the HTTP status; infer it from error page titles
fn status_from_title(title: Option<&str>) -> u16 {
    let Some(title) = title else {
        return 200;
    };

    let t_lower = title.to_lowercase();
    if t_lower.contains("404") || t_lower.contains("not found") {
        404
    } else if t_lower.contains("403")
        || t_lower.contains("forbidden")
        || t_lower.contains("access denied")
    {
        403
    } else if t_lower.contains("500") || t_lower.contains("internal server error") {
        500
    } else {
        200
    }
}

/// Error category followed by the CDP message
fn describe_error(error: &str) -> String {
    format!("{}: {}", parse_error(error), error)
}

fn parse_error(error: &str) -> &'static str {
    if error.contains("ERR_NAME_NOT_RESOLVED") {
        "DNS_FAILED"
    } else if error.contains("ERR_CONNECTION_REFUSED") {
        "CONNECTION_REFUSED"
    } else if error.contains("ERR_CONNECTION_TIMED_OUT") {
        "TIMEOUT"
    } else if error.contains("ERR_CERT") || error.contains("SSL") {
        "SSL_ERROR"
    } else {
        "NETWORK_ERROR"
    }
}
