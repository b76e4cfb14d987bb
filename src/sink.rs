//! Result sink: writes a run's records as one JSON document.

use crate::error::ScrapeError;
use crate::scrape::models::ResultSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Destination of the output file.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the output file with `records` as a pretty-printed array.
    ///
    /// Any previous file is removed first, never merged. Returns the number
    /// of records written. Failures are logged here and returned for the
    /// caller to decide the exit status.
    pub fn flush(&self, records: &ResultSet) -> Result<usize, ScrapeError> {
        let result = self.write(records);
        match &result {
            Ok(count) => info!("Scraping complete. {} products saved to {}", count, self.path.display()),
            Err(e) => error!("Error saving output: {}", e),
        }
        result
    }

    fn write(&self, records: &ResultSet) -> Result<usize, ScrapeError> {
        let json = serde_json::to_vec_pretty(records)?;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed previous output {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(self.persistence(source)),
        }

        std::fs::write(&self.path, json).map_err(|source| self.persistence(source))?;
        Ok(records.len())
    }

    fn persistence(&self, source: std::io::Error) -> ScrapeError {
        ScrapeError::Persistence { path: self.path.clone(), source }
    }
}
