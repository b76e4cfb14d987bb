//! Scrape command: config → engine → driver → sink.

use crate::browser::{BrowserEngine, ChromiumEngine, EngineKind, StaticEngine};
use crate::config::Config;
use crate::scrape::{DetailEnricher, DriverSettings, FieldExtractor, PaginationDriver, RunReport};
use crate::sink::ResultSink;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    /// Output file the sink wrote (or tried to)
    pub output: PathBuf,
    /// Whether the output file was written
    pub persisted: bool,
}

impl RunSummary {
    /// Exit status contract: success unless the sink failed or a traversal
    /// fault left nothing collected.
    pub fn exit_success(&self) -> bool {
        self.persisted && !self.report.is_fatal()
    }
}

/// Runs one scrape of the configured listing.
pub struct ScrapeCommand {
    config: Config,
}

impl ScrapeCommand {
    /// Creates a new scrape command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Launches the configured engine, scrapes and writes the output file.
    ///
    /// Only configuration problems are returned as `Err`. Engine and
    /// traversal failures end up in the report, and the (possibly empty)
    /// records are still written.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let origin = self.validate()?;

        let report = match self.config.engine {
            EngineKind::Chromium => match ChromiumEngine::launch(&self.config).await {
                Ok(engine) => {
                    let report = self.run(&engine, origin, cancel).await;
                    if let Err(e) = engine.shutdown().await {
                        warn!("Failed to shut down browser: {}", e);
                    }
                    report
                }
                Err(e) => self.aborted(e),
            },
            EngineKind::Static => match StaticEngine::from_config(&self.config) {
                Ok(engine) => self.run(&engine, origin, cancel).await,
                Err(e) => self.aborted(e),
            },
        };

        Ok(self.persist(report))
    }

    /// Scrapes with a provided engine (for testing).
    pub async fn execute_with_engine<B: BrowserEngine>(
        &self,
        engine: &B,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let origin = self.validate()?;
        let report = self.run(engine, origin, cancel).await;
        Ok(self.persist(report))
    }

    async fn run<B: BrowserEngine>(&self, engine: &B, origin: String, cancel: CancellationToken) -> RunReport {
        info!("Scraping {} with the {} engine", self.config.listing_url, self.config.engine);

        let extractor = FieldExtractor::new(self.config.selectors.clone(), origin);
        let enricher = DetailEnricher::new(
            engine,
            self.config.selectors.detail_description.clone(),
            Duration::from_secs(self.config.navigation_timeout_secs),
            self.config.navigation_retries,
        );
        let driver = PaginationDriver::new(
            engine,
            DriverSettings::from_config(&self.config),
            extractor,
            enricher,
            cancel,
        );

        let report = driver.run().await;
        info!(
            pages = report.pages_visited,
            cards = report.cards_seen,
            records = report.records.len(),
            card_faults = report.card_faults,
            enrichment_faults = report.enrichment_faults,
            stop = %report.stop_reason,
            "Run finished"
        );
        report
    }

    fn validate(&self) -> Result<String> {
        let origin = self.config.resolved_origin()?;

        let invalid = self.config.selectors.invalid();
        if !invalid.is_empty() {
            bail!("Invalid selectors in configuration: {}", invalid.join(", "));
        }

        Ok(origin)
    }

    fn aborted(&self, e: impl std::fmt::Display) -> RunReport {
        error!("Fatal error in scrape: {}", e);
        RunReport::aborted(e.to_string())
    }

    fn persist(&self, report: RunReport) -> RunSummary {
        let sink = ResultSink::new(&self.config.output);
        let persisted = sink.flush(&report.records).is_ok();
        RunSummary { report, output: self.config.output.clone(), persisted }
    }
}
