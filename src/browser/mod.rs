//! Browser-automation capability consumed by the scraper.
//!
//! The traversal and extraction logic only ever talks to these traits, so
//! the same code runs against headless Chromium, plain fetched HTML or an
//! in-memory site in tests.

pub mod chromium;
pub mod static_html;

use crate::error::BrowserError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub use chromium::{ChromiumElement, ChromiumEngine, ChromiumPage};
pub use static_html::{HtmlSource, HttpSource, MemorySite, StaticElement, StaticEngine, StaticPage};

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// A running browser able to open isolated page contexts.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Page: PageContext;

    /// Opens a fresh, blank page context.
    async fn new_page(&self) -> BrowserResult<Self::Page>;
}

/// One page context (a tab). Navigation in one context never touches
/// another context's DOM or element handles.
#[async_trait]
pub trait PageContext: Send + Sync {
    type Element: ElementHandle;

    /// Navigates the context to `url`.
    async fn goto(&self, url: &str) -> BrowserResult<()>;

    /// Waits until the page is quiescent.
    async fn wait_for_idle(&self) -> BrowserResult<()>;

    /// Returns the first element matching `selector`, if any.
    async fn query_one(&self, selector: &str) -> BrowserResult<Option<Self::Element>>;

    /// Returns every element matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<Self::Element>>;

    /// Full page markup. Diagnostics only.
    async fn content(&self) -> BrowserResult<String>;

    /// Closes the context. Handles obtained from it become unusable.
    async fn close(&self) -> BrowserResult<()>;
}

/// A handle to an element inside a page context.
#[async_trait]
pub trait ElementHandle: Sized + Send + Sync {
    /// First descendant matching `selector`.
    async fn query_one(&self, selector: &str) -> BrowserResult<Option<Self>>;

    /// All descendants matching `selector`.
    async fn query_all(&self, selector: &str) -> BrowserResult<Vec<Self>>;

    /// Text content of the element (untrimmed).
    async fn text(&self) -> BrowserResult<Option<String>>;

    /// Value of the named attribute.
    async fn attribute(&self, name: &str) -> BrowserResult<Option<String>>;

    /// Whether the element is enabled and actionable.
    async fn is_enabled(&self) -> BrowserResult<bool>;

    /// Activates the element as a user click would. Returns once the page
    /// has left the document the element belonged to, so a query made
    /// afterwards never sees the previous document.
    async fn click(&self) -> BrowserResult<()>;
}

/// Pause between navigation attempts.
const RETRY_PAUSE: Duration = Duration::from_millis(250);

/// Pause between checks of [`wait_until`].
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls `check` until it reports `true`. Fails with
/// [`BrowserError::Timeout`] once `limit` has elapsed, or with the first
/// error `check` returns.
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> BrowserResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BrowserResult<bool>>,
{
    let poll = async {
        loop {
            match check().await {
                Ok(true) => return Ok(()),
                Ok(false) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => return Err(e),
            }
        }
    };

    tokio::time::timeout(limit, poll)
        .await
        .map_err(|_| BrowserError::Timeout(limit))?
}

/// Runs `op`, retrying up to `retries` extra times on navigation-type
/// failures. Selector errors and closed contexts are not retried.
pub async fn with_retries<T, F, Fut>(retries: u32, what: &str, mut op: F) -> BrowserResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BrowserResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e @ (BrowserError::Selector(_) | BrowserError::Closed)) => return Err(e),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!("{} failed ({}), retry {}/{}", what, e, attempt, retries);
                tokio::time::sleep(RETRY_PAUSE).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Which engine renders the listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Headless Chromium, runs the site's JavaScript.
    #[default]
    Chromium,
    /// Plain HTTP fetch + HTML parsing, no JavaScript.
    Static,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(EngineKind::Chromium),
            "static" | "http" => Ok(EngineKind::Static),
            _ => Err(format!("Unknown engine: {}. Use: chromium, static", s)),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Chromium => write!(f, "chromium"),
            EngineKind::Static => write!(f, "static"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_parsing() {
        assert_eq!("chromium".parse::<EngineKind>().unwrap(), EngineKind::Chromium);
        assert_eq!("Chrome".parse::<EngineKind>().unwrap(), EngineKind::Chromium);
        assert_eq!("static".parse::<EngineKind>().unwrap(), EngineKind::Static);
        assert_eq!("HTTP".parse::<EngineKind>().unwrap(), EngineKind::Static);

        let err = "firefox".parse::<EngineKind>().unwrap_err();
        assert!(err.contains("Unknown engine"));
    }

    #[tokio::test]
    async fn test_with_retries_recovers() {
        let mut calls = 0;
        let result = with_retries(2, "goto", || {
            calls += 1;
            let outcome = if calls < 2 {
                Err(BrowserError::Protocol("flaky".to_string()))
            } else {
                Ok(calls)
            };
            async move { outcome }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_with_retries_gives_up() {
        let mut calls = 0;
        let result: BrowserResult<()> = with_retries(1, "goto", || {
            calls += 1;
            async { Err(BrowserError::Timeout(Duration::from_secs(1))) }
        })
        .await;

        assert!(matches!(result, Err(BrowserError::Timeout(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_with_retries_skips_selector_errors() {
        let mut calls = 0;
        let result: BrowserResult<()> = with_retries(3, "query", || {
            calls += 1;
            async { Err(BrowserError::Selector("div[[".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_wait_until_returns_once_changed() {
        let mut checks = 0;
        let result = wait_until(Duration::from_secs(5), || {
            checks += 1;
            let moved = checks >= 3;
            async move { BrowserResult::Ok(moved) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn test_wait_until_times_out_on_unchanged_page() {
        let limit = Duration::from_millis(250);
        let result = wait_until(limit, || async { BrowserResult::Ok(false) }).await;

        match result {
            Err(BrowserError::Timeout(d)) => assert_eq!(d, limit),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wait_until_propagates_check_error() {
        let result = wait_until(Duration::from_secs(5), || async { BrowserResult::<bool>::Err(BrowserError::Closed) }).await;
        assert!(matches!(result, Err(BrowserError::Closed)));
    }

    #[test]
    fn test_engine_kind_display_and_serde() {
        assert_eq!(EngineKind::Chromium.to_string(), "chromium");
        assert_eq!(EngineKind::Static.to_string(), "static");
        assert_eq!(EngineKind::default(), EngineKind::Chromium);

        let json = serde_json::to_string(&EngineKind::Static).unwrap();
        assert_eq!(json, "\"static\"");
    }
}
