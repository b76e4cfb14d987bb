//! Subscriber setup: the run log file plus console output.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Opens the run log, truncating what a previous run left behind.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    File::create(path).with_context(|| format!("Failed to create log file: {}", path.display()))
}

/// Installs the global subscriber.
///
/// The file gets timestamped, leveled lines from this crate (INFO, DEBUG
/// when `verbose`). The console only shows warnings unless `verbose` is set
/// or `RUST_LOG` says otherwise. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init(log_file: &Path, verbose: bool) -> Result<WorkerGuard> {
    let file = open_log_file(log_file)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let file_filter = EnvFilter::new(if verbose {
        "warn,listing_scraper=debug"
    } else {
        "warn,listing_scraper=info"
    });
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(file_filter);

    let console_filter = if verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scraper.log");
        std::fs::write(&path, "previous run\n".repeat(100)).unwrap();

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "Script started.").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Script started.\n");
    }

    #[test]
    fn test_open_log_file_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("nested").join("scraper.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_bad_path() {
        let dir = TempDir::new().unwrap();
        let err = open_log_file(dir.path()).unwrap_err().to_string();
        assert!(err.contains("Failed to create log file"));
    }
}
