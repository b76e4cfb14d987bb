//! Configuration management with TOML, environment variables, and CLI overrides.

use crate::browser::EngineKind;
use crate::scrape::models::DescriptionPolicy;
use crate::scrape::selectors::SelectorSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Demo listing the default selectors are written for.
pub const DEFAULT_LISTING_URL: &str =
    "https://webscraper.io/test-sites/e-commerce/allinone/computers/laptops";

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// First page of the listing
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Origin prepended to relative product links (derived from listing_url when unset)
    #[serde(default)]
    pub origin: Option<String>,

    /// JSON output file
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Run log file, truncated at start
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Rendering engine
    #[serde(default)]
    pub engine: EngineKind,

    /// Run Chromium without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Explicit Chromium executable
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Hard cap on listing pages visited
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Fixed delay before each page is scraped, for late-rendering lists
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Bound on a single navigation or detail-page enrichment
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Extra attempts for a failed navigation or quiescence wait
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,

    /// How the detail-page description combines with the card's own
    #[serde(default)]
    pub description: DescriptionPolicy,

    /// Also print the records to stdout in this format
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Selectors used against the listing and detail pages
    #[serde(default)]
    pub selectors: SelectorSet,
}

fn default_listing_url() -> String {
    DEFAULT_LISTING_URL.to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("output.json")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("scraper.log")
}

fn default_headless() -> bool {
    true
}

fn default_max_pages() -> u32 {
    50
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_navigation_retries() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            origin: None,
            output: default_output(),
            log_file: default_log_file(),
            engine: EngineKind::default(),
            headless: default_headless(),
            chrome_path: None,
            max_pages: default_max_pages(),
            settle_delay_ms: default_settle_delay_ms(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            navigation_retries: default_navigation_retries(),
            description: DescriptionPolicy::default(),
            format: None,
            selectors: SelectorSet::default(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let local_config = Path::new("listing-scraper.toml");
        if local_config.exists() {
            debug!("Found listing-scraper.toml in current directory");
            return Self::from_file(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("listing-scraper").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("SCRAPER_URL") {
            self.listing_url = url;
        }

        if let Ok(output) = std::env::var("SCRAPER_OUTPUT") {
            self.output = PathBuf::from(output);
        }

        if let Ok(log_file) = std::env::var("SCRAPER_LOG_FILE") {
            self.log_file = PathBuf::from(log_file);
        }

        if let Ok(engine) = std::env::var("SCRAPER_ENGINE") {
            if let Ok(e) = engine.parse() {
                self.engine = e;
            }
        }

        if let Ok(max_pages) = std::env::var("SCRAPER_MAX_PAGES") {
            if let Ok(n) = max_pages.parse() {
                self.max_pages = n;
            }
        }

        self
    }

    /// Origin used to absolutize relative product links.
    pub fn resolved_origin(&self) -> Result<String> {
        if let Some(origin) = &self.origin {
            return Ok(origin.trim_end_matches('/').to_string());
        }

        let url = Url::parse(&self.listing_url)
            .with_context(|| format!("Invalid listing URL: {}", self.listing_url))?;
        Ok(url.origin().ascii_serialization())
    }
}

/// Format for printing records to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Markdown,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use: table, json, markdown, csv", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listing_url, DEFAULT_LISTING_URL);
        assert!(config.origin.is_none());
        assert_eq!(config.output, PathBuf::from("output.json"));
        assert_eq!(config.log_file, PathBuf::from("scraper.log"));
        assert_eq!(config.engine, EngineKind::Chromium);
        assert!(config.headless);
        assert!(config.chrome_path.is_none());
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.navigation_timeout_secs, 30);
        assert_eq!(config.navigation_retries, 1);
        assert_eq!(config.description, DescriptionPolicy::Detail);
        assert!(config.format.is_none());
        assert_eq!(config.selectors.card, "div.card.thumbnail");
    }

    #[test]
    fn test_resolved_origin_from_listing_url() {
        let config = Config::new();
        assert_eq!(config.resolved_origin().unwrap(), "https://webscraper.io");

        let config = Config { listing_url: "http://localhost:8080/shop/list".to_string(), ..Config::new() };
        assert_eq!(config.resolved_origin().unwrap(), "http://localhost:8080");
    }

    #[test]
    fn test_resolved_origin_explicit() {
        let config = Config { origin: Some("https://cdn.shop.test/".to_string()), ..Config::new() };
        assert_eq!(config.resolved_origin().unwrap(), "https://cdn.shop.test");
    }

    #[test]
    fn test_resolved_origin_invalid_url() {
        let config = Config { listing_url: "not a url".to_string(), ..Config::new() };
        let err = config.resolved_origin().unwrap_err().to_string();
        assert!(err.contains("Invalid listing URL"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);

        let err = "invalid".parse::<OutputFormat>().unwrap_err();
        assert!(err.contains("Unknown format"));
        assert!(err.contains("table, json, markdown, csv"));
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Table.to_string(), "table");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Markdown.to_string(), "markdown");
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            listing_url = "https://shop.test/list"
            engine = "static"
            max_pages = 3
            settle_delay_ms = 0
            description = "fallback"
            format = "csv"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.listing_url, "https://shop.test/list");
        assert_eq!(config.engine, EngineKind::Static);
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.description, DescriptionPolicy::Fallback);
        assert_eq!(config.format, Some(OutputFormat::Csv));
        // untouched fields keep their defaults
        assert_eq!(config.navigation_timeout_secs, 30);
        assert!(config.headless);
    }

    #[test]
    fn test_config_selector_overrides() {
        let toml = r#"
            [selectors]
            card = "li.product"
            description = ["div.blurb", "p"]
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.selectors.card, "li.product");
        assert_eq!(config.selectors.description, vec!["div.blurb", "p"]);
        assert_eq!(config.selectors.title, "a.title");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            output = "laptops.json"
            navigation_retries = 3
            "#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.output, PathBuf::from("laptops.json"));
        assert_eq!(config.navigation_retries, 3);
    }

    #[test]
    fn test_config_from_file_not_found() {
        let result = Config::from_file("/nonexistent/path/config.toml");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_config_from_file_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml {{{{").unwrap();

        let err = Config::from_file(file.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_config_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"max_pages = 7"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.max_pages, 7);
    }

    // Both env tests touch the same variables; kept in one test to avoid races.
    #[test]
    fn test_config_with_env() {
        let keys = ["SCRAPER_URL", "SCRAPER_OUTPUT", "SCRAPER_ENGINE", "SCRAPER_MAX_PAGES", "SCRAPER_LOG_FILE"];
        let saved: Vec<_> = keys.iter().map(|k| std::env::var(k).ok()).collect();

        std::env::set_var("SCRAPER_URL", "https://shop.test/list");
        std::env::set_var("SCRAPER_OUTPUT", "/tmp/out.json");
        std::env::set_var("SCRAPER_ENGINE", "static");
        std::env::set_var("SCRAPER_MAX_PAGES", "4");
        std::env::set_var("SCRAPER_LOG_FILE", "/tmp/run.log");

        let config = Config::new().with_env();
        assert_eq!(config.listing_url, "https://shop.test/list");
        assert_eq!(config.output, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.engine, EngineKind::Static);
        assert_eq!(config.max_pages, 4);
        assert_eq!(config.log_file, PathBuf::from("/tmp/run.log"));

        // Invalid values are ignored
        std::env::set_var("SCRAPER_ENGINE", "netscape");
        std::env::set_var("SCRAPER_MAX_PAGES", "lots");
        let config = Config::new().with_env();
        assert_eq!(config.engine, EngineKind::Chromium);
        assert_eq!(config.max_pages, 50);

        for (key, value) in keys.iter().zip(saved) {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
