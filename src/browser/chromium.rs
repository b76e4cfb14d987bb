//! Headless Chromium engine over the DevTools protocol.

use super::{wait_until, BrowserEngine, BrowserResult, ElementHandle, PageContext};
use crate::config::Config;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Enabled unless disabled directly or wrapped in a `.disabled` ancestor.
/// Pagination widgets disable the `<li>`, not the anchor.
const IS_ENABLED_JS: &str = r#"function() {
    if (this.disabled) return false;
    if (this.getAttribute('aria-disabled') === 'true') return false;
    return this.closest('.disabled') === null;
}"#;

const TEXT_CONTENT_JS: &str = "function() { return this.textContent; }";

const IS_CONNECTED_JS: &str = "function() { return this.isConnected; }";

/// A launched Chromium process and its protocol event loop.
pub struct ChromiumEngine {
    browser: Browser,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumEngine {
    /// Launches Chromium according to the configuration.
    pub async fn launch(config: &Config) -> BrowserResult<Self> {
        let navigation_timeout = Duration::from_secs(config.navigation_timeout_secs);
        let mut builder = BrowserConfig::builder().request_timeout(navigation_timeout);

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &config.chrome_path {
            debug!("Using Chromium executable: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        info!("Launching Chromium (headless: {})", config.headless);
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("Browser event error: {}", e);
                }
            }
            debug!("Browser event loop finished");
        });

        info!("Browser launched");
        Ok(Self { browser, handler, navigation_timeout })
    }

    /// Closes the browser and waits for the process to exit.
    pub async fn shutdown(mut self) -> BrowserResult<()> {
        self.browser.close().await.map_err(protocol)?;
        if let Err(e) = self.browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    type Page = ChromiumPage;

    async fn new_page(&self) -> BrowserResult<ChromiumPage> {
        let page = self.browser.new_page("about:blank").await.map_err(protocol)?;
        Ok(ChromiumPage { page, navigation_timeout: self.navigation_timeout })
    }
}

/// One Chromium tab.
pub struct ChromiumPage {
    page: Page,
    navigation_timeout: Duration,
}

#[async_trait]
impl PageContext for ChromiumPage {
    type Element = ChromiumElement;

    async fn goto(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(url, e))?;
        Ok(())
    }

    async fn wait_for_idle(&self) -> BrowserResult<()> {
        self.page.wait_for_navigation().await.map_err(protocol)?;
        Ok(())
    }

    async fn query_one(&self, selector: &str) -> BrowserResult<Option<ChromiumElement>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<ChromiumElement>> {
        let elements = self.page.find_elements(selector).await.map_err(protocol)?;
        Ok(wrap(&self.page, self.navigation_timeout, elements))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page.content().await.map_err(protocol)
    }

    async fn close(&self) -> BrowserResult<()> {
        self.page.clone().close().await.map_err(protocol)
    }
}

/// A remote DOM node inside a Chromium tab.
pub struct ChromiumElement {
    element: Element,
    page: Page,
    navigation_timeout: Duration,
}

impl ChromiumElement {
    /// True once the tab shows another URL or this node left the document.
    /// A node whose execution context was destroyed by a navigation counts
    /// as gone.
    async fn has_left(&self, url_before: &Option<String>) -> BrowserResult<bool> {
        if self.page.url().await.map_err(protocol)? != *url_before {
            return Ok(true);
        }
        match self.element.call_js_fn(IS_CONNECTED_JS, false).await {
            Ok(ret) => Ok(ret.result.value.and_then(|v| v.as_bool()) != Some(true)),
            Err(e) => {
                trace!("Clicked element unreachable: {}", e);
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn query_one(&self, selector: &str) -> BrowserResult<Option<Self>> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<Self>> {
        let elements = self.element.find_elements(selector).await.map_err(protocol)?;
        Ok(wrap(&self.page, self.navigation_timeout, elements))
    }

    async fn text(&self) -> BrowserResult<Option<String>> {
        let ret = self.element.call_js_fn(TEXT_CONTENT_JS, false).await.map_err(protocol)?;
        Ok(ret.result.value.and_then(|v| v.as_str().map(String::from)))
    }

    async fn attribute(&self, name: &str) -> BrowserResult<Option<String>> {
        self.element.attribute(name).await.map_err(protocol)
    }

    async fn is_enabled(&self) -> BrowserResult<bool> {
        let ret = self.element.call_js_fn(IS_ENABLED_JS, false).await.map_err(protocol)?;
        Ok(ret.result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn click(&self) -> BrowserResult<()> {
        let url_before = self.page.url().await.map_err(protocol)?;
        self.element.click().await.map_err(protocol)?;

        // The click only dispatches input events; the navigation it starts
        // may not be registered yet when they are acknowledged.
        let url_before = &url_before;
        wait_until(self.navigation_timeout, || async move { self.has_left(url_before).await }).await?;
        debug!("Click moved the page off {}", url_before.as_deref().unwrap_or("about:blank"));
        Ok(())
    }
}

fn wrap(page: &Page, navigation_timeout: Duration, elements: Vec<Element>) -> Vec<ChromiumElement> {
    elements
        .into_iter()
        .map(|element| ChromiumElement { element, page: page.clone(), navigation_timeout })
        .collect()
}

fn protocol(err: CdpError) -> BrowserError {
    BrowserError::Protocol(err.to_string())
}

fn navigation_error(url: &str, err: CdpError) -> BrowserError {
    BrowserError::Navigation { url: url.to_string(), reason: err.to_string() }
}
