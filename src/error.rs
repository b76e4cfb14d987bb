//! Fault taxonomy for the scraper.
//!
//! A missing element is never an error: extraction resolves it to the
//! field's default. Everything here is a real fault, contained by the
//! smallest scope that still lets the run make progress.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a browser-automation engine.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("element is no longer attached to the page")]
    StaleElement,

    #[error("page context is closed")]
    Closed,

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Faults raised while traversing a listing and persisting its records.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// One card could not be read. The card is skipped.
    #[error("card {index} on page {page} could not be extracted: {source}")]
    CardExtraction {
        page: u32,
        index: usize,
        #[source]
        source: BrowserError,
    },

    /// The detail page of one product could not be read. Only the
    /// description of that record is affected.
    #[error("detail page {url} could not be read: {source}")]
    Enrichment {
        url: String,
        #[source]
        source: BrowserError,
    },

    /// Page loading or pagination failed. Traversal stops, collected
    /// records are kept.
    #[error("traversal aborted on page {page}: {source}")]
    Traversal {
        page: u32,
        #[source]
        source: BrowserError,
    },

    #[error("traversal cancelled")]
    Cancelled,

    #[error("failed to write {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_extraction_message() {
        let err = ScrapeError::CardExtraction { page: 2, index: 4, source: BrowserError::StaleElement };
        let msg = err.to_string();
        assert!(msg.contains("card 4 on page 2"));
        assert!(msg.contains("no longer attached"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = ScrapeError::Traversal {
            page: 1,
            source: BrowserError::Navigation {
                url: "https://example.com".to_string(),
                reason: "connection refused".to_string(),
            },
        };
        let source = err.source().unwrap().to_string();
        assert!(source.contains("https://example.com"));
        assert!(source.contains("connection refused"));
    }

    #[test]
    fn test_timeout_message() {
        let err = BrowserError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "operation timed out after 30s");
    }
}
