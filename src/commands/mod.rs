//! CLI command implementations.

pub mod scrape;

pub use scrape::{RunSummary, ScrapeCommand};
