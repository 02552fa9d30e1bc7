//! lookup command: find the boundary page of one or more listings
//!
//! LLM-optimized output - JSON compact (or YAML) on stdout, progress on stderr.

use crate::browser::BrowserFetcher;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::locator::{Locator, Strategy};
use crate::marker::MarkerPredicate;
use crate::progress::ProgressIndicator;
use crate::session::ActiveLookups;
use crate::settings::Settings;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

#[derive(Args)]
pub struct LookupArgs {
    /// Listing URLs to search (one lookup per URL)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Search algorithm (overrides the settings file)
    #[arg(long, short, value_enum, env = "PAGEBOUND_ALGORITHM")]
    pub algorithm: Option<Strategy>,

    /// Highest page ever requested
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub ceiling: Option<u32>,

    /// CSS selector of the marker element
    #[arg(long)]
    pub selector: Option<String>,

    /// Text the marker element must contain
    #[arg(long)]
    pub text: Option<String>,

    /// Fetch pages with headless Chrome instead of plain HTTP
    #[arg(long)]
    pub browser: bool,

    /// Give up on a lookup after this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    pub timeout: u64,

    /// Output format: json (default) or yaml
    #[arg(long, short, default_value = "json")]
    pub format: String,

    /// Settings file
    #[arg(long, env = "PAGEBOUND_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Don't draw the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// Result of one lookup (compact)
#[derive(Debug, Serialize)]
pub struct LookupResult {
    pub url: String,
    pub algorithm: Strategy,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl LookupResult {
    fn failed(url: &str, algorithm: Strategy, error: String, elapsed_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            algorithm,
            ok: false,
            resolved: None,
            page: None,
            fetches: None,
            error: Some(error),
            elapsed_ms,
        }
    }
}

/// Full report (compact)
#[derive(Debug, Serialize)]
pub struct LookupReport {
    pub ok: usize,
    pub failed: usize,
    pub timestamp: String,
    pub results: Vec<LookupResult>,
}

impl LookupReport {
    pub fn new(results: Vec<LookupResult>) -> Self {
        let ok = results.iter().filter(|r| r.ok).count();
        Self {
            ok,
            failed: results.len() - ok,
            timestamp: Utc::now().to_rfc3339(),
            results,
        }
    }
}

/// Run the lookup command
pub async fn run_lookup(args: LookupArgs) -> Result<()> {
    let settings = resolve_settings(&args).await?;

    for url in &args.urls {
        url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    }

    let marker = settings.header_marker()?;
    let timeout = (args.timeout > 0).then_some(Duration::from_millis(args.timeout));
    let strategy = settings.algorithm;

    eprintln!(
        "Looking up {} listing{} ({}, ceiling {})...",
        args.urls.len(),
        if args.urls.len() == 1 { "" } else { "s" },
        strategy,
        settings.ceiling
    );

    let progress = (!args.no_progress && std::io::stderr().is_terminal()).then(|| {
        ProgressIndicator::start(|frame| {
            eprint!("\r{} searching", SPINNER[frame % SPINNER.len()]);
            let _ = std::io::stderr().flush();
        })
    });

    let results = if args.browser {
        let fetcher = BrowserFetcher::launch(&settings.user_agent, Duration::from_secs(30)).await?;
        let locator = Arc::new(Locator::new(fetcher, marker).with_ceiling(settings.ceiling));
        let results = run_searches(Arc::clone(&locator), &args.urls, strategy, timeout).await;

        match release(locator) {
            Some(fetcher) => {
                if let Err(e) = fetcher.close().await {
                    log::warn!("failed to close browser: {}", e);
                }
            }
            None => log::warn!("browser still in use, leaving it to drop"),
        }
        results
    } else {
        let fetcher = HttpFetcher::new(&settings.user_agent, None)?;
        let locator = Arc::new(Locator::new(fetcher, marker).with_ceiling(settings.ceiling));
        run_searches(locator, &args.urls, strategy, timeout).await
    };

    if let Some(progress) = progress {
        progress
            .stop(|| {
                eprint!("\r              \r");
            })
            .await;
    }

    let report = LookupReport::new(results);
    println!("{}", render(&report, &args.format)?);
    eprintln!("Done: {}/{} OK", report.ok, report.ok + report.failed);

    if report.failed > 0 {
        bail!("{} lookup(s) failed", report.failed);
    }

    Ok(())
}

/// Search every URL concurrently; one result per URL, in input order
async fn run_searches<F, M>(
    locator: Arc<Locator<F, M>>,
    urls: &[String],
    strategy: Strategy,
    timeout: Option<Duration>,
) -> Vec<LookupResult>
where
    F: PageFetcher + 'static,
    M: MarkerPredicate + 'static,
{
    let lookups = ActiveLookups::new();
    let mut slots: Vec<Option<LookupResult>> = Vec::with_capacity(urls.len());
    let mut positions = Vec::new();
    let mut tasks = Vec::new();

    for (index, url) in urls.iter().enumerate() {
        let ticket = match lookups.begin(url) {
            Ok(ticket) => ticket,
            Err(e) => {
                log::warn!("{}", e);
                slots.push(Some(LookupResult::failed(url, strategy, e.to_string(), 0)));
                continue;
            }
        };

        slots.push(None);
        positions.push(index);

        let locator = Arc::clone(&locator);
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            let result = lookup_one(&locator, strategy, &url, timeout).await;
            drop(ticket);
            result
        }));
    }

    for (index, joined) in positions.into_iter().zip(join_all(tasks).await) {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                log::error!("lookup task for {} failed: {}", urls[index], e);
                let error = format!("lookup task failed: {}", e);
                LookupResult::failed(&urls[index], strategy, error, 0)
            }
        };
        slots[index] = Some(result);
    }

    slots.into_iter().flatten().collect()
}

/// Take the fetcher back once no search holds the locator
fn release<F, M>(locator: Arc<Locator<F, M>>) -> Option<F>
where
    F: PageFetcher,
    M: MarkerPredicate,
{
    Arc::try_unwrap(locator).ok().map(Locator::into_fetcher)
}

/// Settings file (if any) with command-line overrides applied
async fn resolve_settings(args: &LookupArgs) -> Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path).await?,
        None => Settings::default(),
    };

    if let Some(algorithm) = args.algorithm {
        settings.algorithm = algorithm;
    }
    if let Some(ceiling) = args.ceiling {
        settings.ceiling = ceiling;
    }
    if let Some(selector) = &args.selector {
        settings.marker.selector = selector.clone();
    }
    if let Some(text) = &args.text {
        settings.marker.text = text.clone();
    }

    Ok(settings)
}

/// Run one search, bounded by an optional watchdog
pub async fn lookup_one<F, M>(
    locator: &Locator<F, M>,
    strategy: Strategy,
    url: &str,
    timeout: Option<Duration>,
) -> LookupResult
where
    F: PageFetcher,
    M: MarkerPredicate,
{
    eprintln!("  -> {}", truncate(url, 60));
    let started = Instant::now();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, locator.search(strategy, url)).await {
            Ok(outcome) => outcome.map_err(|e| e.to_string()),
            Err(_) => Err(format!("lookup timed out after {} ms", limit.as_millis())),
        },
        None => locator.search(strategy, url).await.map_err(|e| e.to_string()),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(found) => LookupResult {
            url: url.to_string(),
            algorithm: strategy,
            ok: true,
            resolved: Some(found.url),
            page: Some(found.page),
            fetches: Some(found.fetches),
            error: None,
            elapsed_ms,
        },
        Err(e) => {
            log::warn!("lookup for {} failed: {}", url, e);
            LookupResult::failed(url, strategy, e, elapsed_ms)
        }
    }
}

fn render(report: &LookupReport, format: &str) -> Result<String> {
    Ok(match format {
        "yaml" | "yml" => serde_yaml::to_string(report)?,
        _ => serde_json::to_string(report)?,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
