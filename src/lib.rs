//! listing-scraper - Paginated product-listing scraper
//!
//! Walks a client-rendered e-commerce listing page by page, extracts one
//! record per product card, enriches each record from its detail page and
//! writes the whole run as a single JSON document.

pub mod browser;
pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod scrape;
pub mod sink;

pub use config::Config;
pub use error::{BrowserError, ScrapeError};
pub use scrape::models::{ProductRecord, ResultSet, RunReport, StopReason};
