//! Engine for listings that render without JavaScript.
//!
//! Pages are fetched from an [`HtmlSource`] and queried with CSS selectors.
//! Element handles are selector paths from the document root, re-resolved on
//! every call; a navigation bumps the page generation so old handles go stale
//! the same way remote DOM nodes do in a real browser.

use super::{BrowserEngine, BrowserResult, ElementHandle, PageContext};
use crate::config::Config;
use crate::error::BrowserError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;
use wreq::Client;
use wreq_util::Emulation;

/// Where page markup comes from.
#[async_trait]
pub trait HtmlSource: Send + Sync {
    /// Returns the markup served at `url`.
    async fn fetch(&self, url: &str) -> BrowserResult<String>;
}

/// Fetches pages over HTTP with a browser-like TLS fingerprint.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Creates a source whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> BrowserResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlSource for HttpSource {
    async fn fetch(&self, url: &str) -> BrowserResult<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| navigation(url, e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(navigation(url, format!("request failed with status: {}", status)));
        }

        response.text().await.map_err(|e| navigation(url, e.to_string()))
    }
}

/// A fixed set of pages held in memory, keyed by absolute URL.
#[derive(Default)]
pub struct MemorySite {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    fetched: Mutex<Vec<String>>,
}

impl MemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` at `url`.
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Makes every fetch of `url` fail.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.insert(url.into());
        self
    }

    /// Delays every fetch of `url`.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// URLs fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }

    /// How many times `url` was fetched.
    pub fn fetch_count(&self, url: &str) -> usize {
        lock(&self.fetched).iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl HtmlSource for MemorySite {
    async fn fetch(&self, url: &str) -> BrowserResult<String> {
        lock(&self.fetched).push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(url) {
            return Err(navigation(url, "connection reset".to_string()));
        }

        self.pages.get(url).cloned().ok_or_else(|| navigation(url, "404 Not Found".to_string()))
    }
}

/// Engine serving page contexts from an [`HtmlSource`].
pub struct StaticEngine {
    source: Arc<dyn HtmlSource>,
    open_pages: Arc<AtomicUsize>,
}

impl StaticEngine {
    pub fn new(source: Arc<dyn HtmlSource>) -> Self {
        Self { source, open_pages: Arc::new(AtomicUsize::new(0)) }
    }

    /// Creates an HTTP-backed engine from the configuration.
    pub fn from_config(config: &Config) -> BrowserResult<Self> {
        let source = HttpSource::new(Duration::from_secs(config.navigation_timeout_secs))?;
        Ok(Self::new(Arc::new(source)))
    }

    /// Number of page contexts opened and not yet closed.
    pub fn open_pages(&self) -> usize {
        self.open_pages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for StaticEngine {
    type Page = StaticPage;

    async fn new_page(&self) -> BrowserResult<StaticPage> {
        self.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(StaticPage {
            source: Arc::clone(&self.source),
            state: Arc::new(Mutex::new(PageState::default())),
            open_pages: Arc::clone(&self.open_pages),
        })
    }
}

#[derive(Default)]
struct PageState {
    url: Option<Url>,
    html: String,
    generation: u64,
    closed: bool,
}

#[derive(Debug, Clone)]
struct Step {
    selector: String,
    index: usize,
}

/// One page context of a [`StaticEngine`].
pub struct StaticPage {
    source: Arc<dyn HtmlSource>,
    state: Arc<Mutex<PageState>>,
    open_pages: Arc<AtomicUsize>,
}

impl StaticPage {
    fn handles(&self, selector: &str, count: usize, generation: u64) -> Vec<StaticElement> {
        (0..count)
            .map(|index| StaticElement {
                source: Arc::clone(&self.source),
                state: Arc::clone(&self.state),
                generation,
                path: vec![Step { selector: selector.to_string(), index }],
            })
            .collect()
    }
}

#[async_trait]
impl PageContext for StaticPage {
    type Element = StaticElement;

    async fn goto(&self, url: &str) -> BrowserResult<()> {
        let target = Url::parse(url).map_err(|e| navigation(url, e.to_string()))?;
        load(self.source.as_ref(), &self.state, target).await
    }

    async fn wait_for_idle(&self) -> BrowserResult<()> {
        // Fetched markup is complete; nothing is left in flight.
        ensure_open(&lock(&self.state))
    }

    async fn query_one(&self, selector: &str) -> BrowserResult<Option<StaticElement>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<StaticElement>> {
        let selector_parsed = parse_selector(selector)?;
        let (count, generation) = {
            let state = lock(&self.state);
            ensure_open(&state)?;
            let document = Html::parse_document(&state.html);
            let count = document.select(&selector_parsed).count();
            (count, state.generation)
        };

        trace!("{} matches for '{}'", count, selector);
        Ok(self.handles(selector, count, generation))
    }

    async fn content(&self) -> BrowserResult<String> {
        let state = lock(&self.state);
        ensure_open(&state)?;
        Ok(state.html.clone())
    }

    async fn close(&self) -> BrowserResult<()> {
        let mut state = lock(&self.state);
        if !state.closed {
            state.closed = true;
            state.html.clear();
            self.open_pages.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Handle to an element of a [`StaticPage`].
pub struct StaticElement {
    source: Arc<dyn HtmlSource>,
    state: Arc<Mutex<PageState>>,
    generation: u64,
    path: Vec<Step>,
}

impl std::fmt::Debug for StaticElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticElement")
            .field("generation", &self.generation)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl StaticElement {
    fn with_element<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> BrowserResult<T> {
        let state = lock(&self.state);
        ensure_open(&state)?;
        if state.generation != self.generation {
            return Err(BrowserError::StaleElement);
        }

        let document = Html::parse_document(&state.html);
        let element = resolve(&document, &self.path)?;
        Ok(f(element))
    }

    fn child(&self, selector: &str, index: usize) -> StaticElement {
        let mut path = self.path.clone();
        path.push(Step { selector: selector.to_string(), index });
        StaticElement {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            generation: self.generation,
            path,
        }
    }
}

#[async_trait]
impl ElementHandle for StaticElement {
    async fn query_one(&self, selector: &str) -> BrowserResult<Option<Self>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<Self>> {
        let selector_parsed = parse_selector(selector)?;
        let count = self.with_element(|el| el.select(&selector_parsed).count())?;
        Ok((0..count).map(|index| self.child(selector, index)).collect())
    }

    async fn text(&self) -> BrowserResult<Option<String>> {
        self.with_element(|el| Some(el.text().collect::<String>()))
    }

    async fn attribute(&self, name: &str) -> BrowserResult<Option<String>> {
        self.with_element(|el| el.value().attr(name).map(String::from))
    }

    async fn is_enabled(&self) -> BrowserResult<bool> {
        self.with_element(|el| {
            let value = el.value();
            if value.attr("disabled").is_some() || value.attr("aria-disabled") == Some("true") {
                return false;
            }

            !std::iter::once(el)
                .chain(el.ancestors().filter_map(ElementRef::wrap))
                .any(|e| e.value().classes().any(|class| class == "disabled"))
        })
    }

    async fn click(&self) -> BrowserResult<()> {
        let href = self.with_element(|el| el.value().attr("href").map(String::from))?;
        let href = href
            .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
            .ok_or_else(|| BrowserError::Protocol("element has no navigable href".to_string()))?;

        let base = lock(&self.state).url.clone();
        let target = match base {
            Some(base) => base.join(&href),
            None => Url::parse(&href),
        }
        .map_err(|e| navigation(&href, e.to_string()))?;

        debug!("Click navigates to {}", target);
        load(self.source.as_ref(), &self.state, target).await
    }
}

async fn load(source: &dyn HtmlSource, state: &Mutex<PageState>, url: Url) -> BrowserResult<()> {
    ensure_open(&lock(state))?;

    let html = source.fetch(url.as_str()).await?;

    let mut state = lock(state);
    ensure_open(&state)?;
    state.html = html;
    state.url = Some(url);
    state.generation += 1;
    Ok(())
}

fn resolve<'a>(document: &'a Html, path: &[Step]) -> BrowserResult<ElementRef<'a>> {
    let (first, rest) = path.split_first().ok_or(BrowserError::StaleElement)?;

    let selector = parse_selector(&first.selector)?;
    let mut current = document.select(&selector).nth(first.index).ok_or(BrowserError::StaleElement)?;

    for step in rest {
        let selector = parse_selector(&step.selector)?;
        current = current.select(&selector).nth(step.index).ok_or(BrowserError::StaleElement)?;
    }

    Ok(current)
}

fn parse_selector(selector: &str) -> BrowserResult<Selector> {
    Selector::parse(selector).map_err(|_| BrowserError::Selector(selector.to_string()))
}

fn ensure_open(state: &PageState) -> BrowserResult<()> {
    if state.closed {
        Err(BrowserError::Closed)
    } else {
        Ok(())
    }
}

fn navigation(url: &str, reason: String) -> BrowserError {
    BrowserError::Navigation { url: url.to_string(), reason }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
