//! Description enrichment from product detail pages.

use crate::browser::{with_retries, BrowserEngine, BrowserResult, ElementHandle, PageContext};
use crate::scrape::models::DescriptionPolicy;
use crate::scrape::normalize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::{BrowserError, ScrapeError};

/// Result of one detail-page visit.
#[derive(Debug)]
pub enum Enrichment {
    /// No product URL, nothing was fetched.
    Skipped,
    /// The description element was found.
    Found(String),
    /// The page loaded but had no description element.
    Missing,
    /// Opening, loading or reading the page failed.
    Failed(ScrapeError),
}

impl Enrichment {
    pub fn is_failure(&self) -> bool {
        matches!(self, Enrichment::Failed(_))
    }

    /// Picks the final description for a record.
    pub fn resolve(self, card_description: String, policy: DescriptionPolicy) -> String {
        match (policy, self) {
            (_, Enrichment::Skipped) => card_description,
            (DescriptionPolicy::Detail, Enrichment::Found(description)) => description,
            (DescriptionPolicy::Detail, _) => String::new(),
            (DescriptionPolicy::Fallback, Enrichment::Found(description)) if !description.is_empty() => {
                description
            }
            (DescriptionPolicy::Fallback, _) => card_description,
        }
    }
}

/// Opens each product URL in its own page context and reads the description.
pub struct DetailEnricher<'a, B: BrowserEngine> {
    browser: &'a B,
    selectors: Vec<String>,
    timeout: Duration,
    retries: u32,
    log_markup: AtomicBool,
}

impl<'a, B: BrowserEngine> DetailEnricher<'a, B> {
    /// `selectors` are tried in order; `timeout` bounds one whole visit.
    pub fn new(browser: &'a B, selectors: Vec<String>, timeout: Duration, retries: u32) -> Self {
        Self { browser, selectors, timeout, retries, log_markup: AtomicBool::new(true) }
    }

    /// Fetches the description for `url`. Never fails: every fault is
    /// logged and reported as [`Enrichment::Failed`].
    pub async fn enrich(&self, url: &str) -> Enrichment {
        if url.is_empty() {
            return Enrichment::Skipped;
        }

        let page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(source) => return self.failed(url, source),
        };
        debug!("Opened detail page for {}", url);

        let outcome = match timeout(self.timeout, self.read_description(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(self.timeout)),
        };

        if let Err(e) = page.close().await {
            warn!("Failed to close detail page for {}: {}", url, e);
        } else {
            debug!("Detail page closed");
        }

        match outcome {
            Ok(Some(description)) => {
                info!("description: {}", description);
                Enrichment::Found(description)
            }
            Ok(None) => {
                warn!("No description element on {}", url);
                Enrichment::Missing
            }
            Err(source) => self.failed(url, source),
        }
    }

    async fn read_description(&self, page: &B::Page, url: &str) -> BrowserResult<Option<String>> {
        with_retries(self.retries, "Detail navigation", || async move {
            page.goto(url).await?;
            page.wait_for_idle().await
        })
        .await?;
        debug!("Navigated to detail page: {}", url);

        if self.log_markup.swap(false, Ordering::Relaxed) && tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(html) = page.content().await {
                debug!("Detail page markup for {}:\n{}", url, normalize::excerpt(&html, 2000));
            }
        }

        for selector in &self.selectors {
            if let Some(el) = page.query_one(selector).await? {
                let text = el.text().await?.unwrap_or_default();
                return Ok(Some(normalize::clean_text(&text)));
            }
        }

        Ok(None)
    }

    fn failed(&self, url: &str, source: BrowserError) -> Enrichment {
        let err = ScrapeError::Enrichment { url: url.to_string(), source };
        error!("{}", err);
        Enrichment::Failed(err)
    }
}
