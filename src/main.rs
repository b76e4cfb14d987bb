//! listing-scraper - Paginated product-listing scraper
//!
//! Walks a JavaScript-rendered e-commerce listing and writes every product
//! it finds to a single JSON file.

use anyhow::Result;
use clap::Parser;
use listing_scraper::browser::EngineKind;
use listing_scraper::commands::ScrapeCommand;
use listing_scraper::config::{Config, OutputFormat};
use listing_scraper::format::Formatter;
use listing_scraper::logging;
use listing_scraper::scrape::DescriptionPolicy;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "listing-scraper",
    version,
    about = "Scrape a paginated product listing into a JSON file",
    long_about = "Walks a client-rendered e-commerce listing page by page, extracts title, price, rating, \
                  review count, link and description for every product, and writes them as one JSON array."
)]
struct Cli {
    /// First page of the listing
    #[arg(short, long)]
    url: Option<String>,

    /// JSON output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run log file (truncated at start)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Rendering engine: chromium or static
    #[arg(short, long)]
    engine: Option<EngineKind>,

    /// Stop after this many listing pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Delay before scraping each page, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Navigation and detail-page timeout, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Extra attempts for failed navigations
    #[arg(long)]
    retries: Option<u32>,

    /// Description policy: detail or fallback
    #[arg(long)]
    description: Option<DescriptionPolicy>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Chromium executable to use
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Also print the records to stdout (table, json, markdown, csv)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Applies command-line overrides on top of file and environment settings.
    fn apply(self, mut config: Config) -> Config {
        if let Some(url) = self.url {
            config.listing_url = url;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
        if let Some(timeout) = self.timeout {
            config.navigation_timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.navigation_retries = retries;
        }
        if let Some(description) = self.description {
            config.description = description;
        }
        if self.headful {
            config.headless = false;
        }
        if let Some(chrome) = self.chrome {
            config.chrome_path = Some(chrome);
        }
        if let Some(format) = self.format {
            config.format = Some(format);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    // Load config with layered overrides
    let config = Config::load(cli.config.as_deref())?.with_env();
    let config = cli.apply(config);

    let _guard = logging::init(&config.log_file, verbose)?;
    info!("Script started.");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with the records collected so far");
            on_signal.cancel();
        }
    });

    let format = config.format;
    let cmd = ScrapeCommand::new(config);
    let summary = cmd.execute(cancel).await?;

    if let Some(format) = format {
        println!("{}", Formatter::new(format).format_records(summary.report.records.as_slice()));
    }

    if summary.exit_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
