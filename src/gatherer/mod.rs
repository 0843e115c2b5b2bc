pub mod cleaner;
pub mod extractor;


use anyhow::{Context, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use self::cleaner::clean_scraped_text;
use self::extractor::extract_page_text;
use crate::corpus::{Corpus, CorpusSnippet, slugify};
use crate::{LoreError, Result};

/// How a page's HTML should be turned into text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Regular wiki article
    #[default]
    Wiki,
    /// Index page whose list items are links worth keeping
    Tutorials,
    /// minecraftcrafting.info: only the intro before the first recipe table
    CraftingRecipes,
}

/// A source page of the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: PageKind,
}

impl WikiPage {
    #[inline]
    pub fn new(name: &str, url: &str, kind: PageKind) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind,
        }
    }
}

/// Configuration for the document gatherer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GathererConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Politeness delay between requests in milliseconds
    pub request_delay_ms: u64,
    /// Maximum number of retry attempts for retryable errors
    pub max_retries: u32,
    /// Delay between retry attempts in seconds
    pub retry_delay_seconds: u64,
    /// Pages making up the corpus, in output order
    pub pages: Vec<WikiPage>,
}

impl Default for GathererConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: concat!("lore-rag/", env!("CARGO_PKG_VERSION"), " (Lore Gatherer)")
                .to_string(),
            timeout_seconds: 30,
            request_delay_ms: 250,
            max_retries: 3,
            retry_delay_seconds: 5,
            pages: default_pages(),
        }
    }
}

/// The Minecraft wiki pages the corpus is built from by default
#[inline]
pub fn default_pages() -> Vec<WikiPage> {
    [
        ("trading", "https://minecraft.wiki/w/Trading", PageKind::Wiki),
        ("brewing", "https://minecraft.wiki/w/Brewing", PageKind::Wiki),
        ("enchanting", "https://minecraft.wiki/w/Enchanting", PageKind::Wiki),
        ("mobs", "https://minecraft.wiki/w/Mob", PageKind::Wiki),
        ("blocks", "https://minecraft.wiki/w/Block", PageKind::Wiki),
        ("items", "https://minecraft.wiki/w/Item", PageKind::Wiki),
        (
            "crafting information",
            "https://minecraft.wiki/w/Crafting",
            PageKind::Wiki,
        ),
        (
            "crafting recipes",
            "https://www.minecraftcrafting.info",
            PageKind::CraftingRecipes,
        ),
        ("smelting", "https://minecraft.wiki/w/Smelting", PageKind::Wiki),
        (
            "tutorials",
            "https://minecraft.wiki/w/Tutorials",
            PageKind::Tutorials,
        ),
        (
            "redstone",
            "https://minecraft.wiki/w/Redstone_circuits",
            PageKind::Wiki,
        ),
    ]
    .into_iter()
    .map(|(name, url, kind)| WikiPage::new(name, url, kind))
    .collect()
}

/// HTTP client wrapper with politeness delay and retry logic
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: GathererConfig,
    last_request_time: Option<Instant>,
}

impl HttpClient {
    #[inline]
    pub fn new(config: GathererConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_request_time: None,
        }
    }

    /// Perform an HTTP GET request with politeness delay and retry logic
    #[inline]
    pub async fn get(&mut self, url: &str) -> anyhow::Result<String> {
        self.apply_request_delay().await;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retrying request to {} (attempt {})", url, attempt + 1);
                sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.try_get(url) {
                Ok(response) => {
                    debug!("Successfully fetched {} (attempt {})", url, attempt + 1);
                    return Ok(response);
                }
                Err(e) if is_retryable_error(&e) && attempt < self.config.max_retries => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("Non-retryable error for {}: {}", url, e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    async fn apply_request_delay(&mut self) {
        if let Some(last_time) = self.last_request_time {
            let elapsed = last_time.elapsed();
            let delay = Duration::from_millis(self.config.request_delay_ms);

            if elapsed < delay {
                let sleep_duration = delay - elapsed;
                debug!("Politeness delay: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        self.last_request_time = Some(Instant::now());
    }

    /// Attempt a single HTTP GET request without retry logic
    fn try_get(&self, url: &str) -> anyhow::Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Successfully read {} bytes from {}", text.len(), url);
                Ok(text)
            }
            Err(ureq::Error::StatusCode(status)) => {
                debug!("HTTP request failed with status {}: {}", status, url);
                Err(anyhow!("HTTP error {}", status))
            }
            Err(e) => {
                debug!("HTTP request failed with transport error: {}", e);
                Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url))
            }
        }
    }
}

impl Default for HttpClient {
    #[inline]
    fn default() -> Self {
        Self::new(GathererConfig::default())
    }
}

/// Check if an error is retryable (timeouts, connection failures, 5xx, 429)
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = format!("{error:#}").to_lowercase();

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("connection")
        || error_str.contains("network")
    {
        return true;
    }

    error_str.contains("http error 5") || error_str.contains("http error 429")
}

/// Fetch, extract and clean one page
#[inline]
pub async fn gather_page(client: &mut HttpClient, page: &WikiPage) -> Result<CorpusSnippet> {
    let page_url = Url::parse(&page.url)
        .map_err(|e| LoreError::Gather(format!("invalid URL for {}: {e}", page.name)))?;

    let html = client
        .get(page_url.as_str())
        .await
        .map_err(|e| LoreError::Gather(format!("failed to fetch {} ({}): {e:#}", page.name, page.url)))?;

    let raw = extract_page_text(&html, &page_url, page.kind);
    let content = clean_scraped_text(&raw);

    if content.is_empty() {
        warn!("Page {} produced no text after cleanup", page.name);
    }

    Ok(CorpusSnippet::new(&page.name, &page.url, &content))
}

/// Gather every configured page into a corpus
///
/// Fails as soon as one page cannot be fetched, so a partial corpus is never
/// returned.
#[inline]
pub async fn gather_corpus(config: &GathererConfig) -> Result<Corpus> {
    if config.pages.is_empty() {
        return Err(LoreError::Gather("no pages configured".to_string()));
    }

    let mut ids = HashSet::with_capacity(config.pages.len());
    for page in &config.pages {
        let id = slugify(&page.name);
        if id.is_empty() || !ids.insert(id) {
            return Err(LoreError::Gather(format!(
                "page name {:?} does not give a unique snippet id",
                page.name
            )));
        }
    }

    let mut client = HttpClient::new(config.clone());
    let mut snippets = Vec::with_capacity(config.pages.len());

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(config.pages.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Gathering {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    for page in &config.pages {
        bar.set_message(page.name.clone());
        info!("Gathering {} from {}", page.name, page.url);

        let snippet = gather_page(&mut client, page).await.inspect_err(|_| {
            bar.abandon_with_message(format!("failed on {}", page.name));
        })?;

        debug!(
            "Gathered {} ({} chars)",
            snippet.title,
            snippet.content.len()
        );
        snippets.push(snippet);
        bar.inc(1);
    }

    bar.finish_and_clear();
    info!("Gathered {} pages", snippets.len());
    Ok(Corpus::new(snippets))
}
