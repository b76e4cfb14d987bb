//! Page-by-page traversal of the listing.
//!
//! The traversal is an explicit state machine. Every suspending browser call
//! happens inside one state handler. Choosing the state after a pagination
//! check needs no browser and lives in [`DriverState::after_pagination`].

use crate::browser::{with_retries, BrowserEngine, ElementHandle, PageContext};
use crate::config::Config;
use crate::error::{BrowserError, ScrapeError};
use crate::scrape::enricher::DetailEnricher;
use crate::scrape::extractor::FieldExtractor;
use crate::scrape::models::{DescriptionPolicy, ResultSet, RunReport, StopReason};
use crate::scrape::normalize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Traversal knobs taken from the configuration.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub listing_url: String,
    pub card_selector: String,
    pub next_selector: String,
    pub max_pages: u32,
    pub settle_delay: Duration,
    pub navigation_retries: u32,
    pub description: DescriptionPolicy,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            listing_url: config.listing_url.clone(),
            card_selector: config.selectors.card.clone(),
            next_selector: config.selectors.next.clone(),
            max_pages: config.max_pages,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            navigation_retries: config.navigation_retries,
            description: config.description,
        }
    }
}

/// Where the traversal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Waiting for page `n` to settle.
    Loading(u32),
    /// Reading the cards of page `n`.
    Extracting(u32),
    /// Looking for the control leading past page `n`.
    Paginating(u32),
    Done(StopReason),
}

/// What the pagination check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Missing,
    Disabled,
    Enabled,
}

impl DriverState {
    pub fn initial() -> Self {
        DriverState::Loading(1)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, DriverState::Done(_))
    }

    /// State following the pagination check on page `page`.
    ///
    /// An enabled control still ends the run once `max_pages` pages have
    /// been scraped.
    pub fn after_pagination(page: u32, control: NextControl, max_pages: u32) -> Self {
        match control {
            NextControl::Missing => DriverState::Done(StopReason::NoNextControl),
            NextControl::Disabled => DriverState::Done(StopReason::NextDisabled),
            NextControl::Enabled if page >= max_pages => DriverState::Done(StopReason::PageCap),
            NextControl::Enabled => DriverState::Loading(page + 1),
        }
    }
}

#[derive(Default)]
struct Tally {
    records: ResultSet,
    pages_visited: u32,
    cards_seen: usize,
    card_faults: usize,
    enrichment_faults: usize,
}

impl Tally {
    fn into_report(self, stop_reason: StopReason, fault: Option<String>) -> RunReport {
        RunReport {
            records: self.records,
            pages_visited: self.pages_visited,
            cards_seen: self.cards_seen,
            card_faults: self.card_faults,
            enrichment_faults: self.enrichment_faults,
            stop_reason,
            fault,
        }
    }
}

/// Walks the listing and collects one record per readable card.
pub struct PaginationDriver<'a, B: BrowserEngine> {
    browser: &'a B,
    settings: DriverSettings,
    extractor: FieldExtractor,
    enricher: DetailEnricher<'a, B>,
    cancel: CancellationToken,
}

impl<'a, B: BrowserEngine> PaginationDriver<'a, B> {
    pub fn new(
        browser: &'a B,
        settings: DriverSettings,
        extractor: FieldExtractor,
        enricher: DetailEnricher<'a, B>,
        cancel: CancellationToken,
    ) -> Self {
        Self { browser, settings, extractor, enricher, cancel }
    }

    /// Runs the traversal to completion.
    ///
    /// Never fails: a traversal fault or cancellation ends the walk early
    /// and the report carries whatever was collected up to that point.
    pub async fn run(self) -> RunReport {
        let mut tally = Tally::default();

        match self.traverse(&mut tally).await {
            Ok(reason) => {
                info!("Traversal finished: {}", reason);
                tally.into_report(reason, None)
            }
            Err(ScrapeError::Cancelled) => {
                warn!("Scrape cancelled, keeping {} records", tally.records.len());
                tally.into_report(StopReason::Cancelled, None)
            }
            Err(e) => {
                error!("Fatal error in scrape: {}", e);
                let fault = e.to_string();
                tally.into_report(StopReason::Fault, Some(fault))
            }
        }
    }

    async fn traverse(&self, tally: &mut Tally) -> Result<StopReason, ScrapeError> {
        self.check_cancelled()?;

        let page = self
            .browser
            .new_page()
            .await
            .map_err(|source| ScrapeError::Traversal { page: 1, source })?;

        let result = self.walk(&page, tally).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close listing page: {}", e);
        }
        result
    }

    async fn walk(&self, page: &B::Page, tally: &mut Tally) -> Result<StopReason, ScrapeError> {
        let url = self.settings.listing_url.as_str();
        with_retries(self.settings.navigation_retries, "Listing navigation", || async move {
            page.goto(url).await?;
            page.wait_for_idle().await
        })
        .await
        .map_err(|source| ScrapeError::Traversal { page: 1, source })?;
        info!("Navigated to {}", url);

        let mut state = DriverState::initial();
        loop {
            state = match state {
                DriverState::Loading(n) => {
                    self.settle(page, n, tally).await?;
                    DriverState::Extracting(n)
                }
                DriverState::Extracting(n) => {
                    self.extract_page(page, n, tally).await?;
                    DriverState::Paginating(n)
                }
                DriverState::Paginating(n) => self.paginate(page, n).await?,
                DriverState::Done(reason) => return Ok(reason),
            };
            debug!(?state, "Driver transition");
        }
    }

    async fn settle(&self, page: &B::Page, n: u32, tally: &mut Tally) -> Result<(), ScrapeError> {
        self.check_cancelled()?;

        if !self.settings.settle_delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(self.settings.settle_delay) => {}
            }
        }

        tally.pages_visited += 1;
        info!("Scraping page {}", n);

        if tracing::enabled!(tracing::Level::DEBUG) {
            match page.content().await {
                Ok(html) => debug!("Page {} markup:\n{}", n, normalize::excerpt(&html, 1000)),
                Err(e) => debug!("Could not read markup of page {}: {}", n, e),
            }
        }
        Ok(())
    }

    async fn extract_page(&self, page: &B::Page, n: u32, tally: &mut Tally) -> Result<(), ScrapeError> {
        let cards = match page.query_all(&self.settings.card_selector).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!("Card query failed on page {}: {}", n, e);
                Vec::new()
            }
        };

        if cards.is_empty() {
            warn!("No products found on page {}", n);
            return Ok(());
        }
        info!("Found {} products on page {}", cards.len(), n);

        for (index, card) in cards.iter().enumerate() {
            self.check_cancelled()?;
            tally.cards_seen += 1;

            let mut fields = match self.extractor.extract(card).await {
                Ok(fields) => fields,
                Err(source) => {
                    error!("{}", ScrapeError::CardExtraction { page: n, index, source });
                    tally.card_faults += 1;
                    continue;
                }
            };

            let enrichment = self.enricher.enrich(&fields.product_url).await;
            if enrichment.is_failure() {
                tally.enrichment_faults += 1;
            }

            let card_description = std::mem::take(&mut fields.card_description);
            let description = enrichment.resolve(card_description, self.settings.description);
            let record = fields.into_record(description);

            info!(page = n, index, title = %record.title, "Extracted product");
            tally.records.push(record);
        }

        Ok(())
    }

    async fn paginate(&self, page: &B::Page, n: u32) -> Result<DriverState, ScrapeError> {
        self.check_cancelled()?;
        let traversal = move |source: BrowserError| ScrapeError::Traversal { page: n, source };

        let next = page.query_one(&self.settings.next_selector).await.map_err(traversal)?;
        let control = match &next {
            None => NextControl::Missing,
            Some(el) => {
                if el.is_enabled().await.map_err(traversal)? {
                    NextControl::Enabled
                } else {
                    NextControl::Disabled
                }
            }
        };

        let state = DriverState::after_pagination(n, control, self.settings.max_pages);
        match (state, next) {
            (DriverState::Loading(_), Some(el)) => {
                info!("Clicking next page button...");
                el.click().await.map_err(traversal)?;
                with_retries(self.settings.navigation_retries, "Page load", move || page.wait_for_idle())
                    .await
                    .map_err(traversal)?;
            }
            (DriverState::Done(StopReason::PageCap), _) => {
                warn!("Reached the cap of {} pages, stopping", self.settings.max_pages);
            }
            (DriverState::Done(reason), _) => info!("No more pages: {}", reason),
            _ => {}
        }

        Ok(state)
    }

    fn check_cancelled(&self) -> Result<(), ScrapeError> {
        if self.cancel.is_cancelled() {
            Err(ScrapeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
