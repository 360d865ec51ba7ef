//! Shared logging setup for seedwatch binaries.
//!
//! Two sinks: a daily-rotated file under `~/.seedwatch/logs` that always
//! records at the configured filter, and stderr, which follows the verbosity
//! flags so it does not fight a progress bar for the terminal.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use seedwatch_protocol::paths::default_logs_dir;

const DEFAULT_LOG_FILTER: &str = "seedwatch=info,seedwatch_logging=info";
const VERBOSE_LOG_FILTER: &str = "seedwatch=debug,seedwatch_logging=debug";
const MAX_LOG_FILES: usize = 5;

/// Logging configuration shared by seedwatch binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Keep stderr to warnings only (a progress bar owns the terminal)
    pub quiet_console: bool,
    /// Override the log directory
    pub log_dir: Option<PathBuf>,
}

/// Flushes buffered file output when dropped. Hold it for the life of `main`.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let log_dir = config.log_dir.unwrap_or_else(default_logs_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create logs directory: {}", log_dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(sanitize_name(config.app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(&log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter(config.verbose, config.quiet_console)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

fn file_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// RUST_LOG wins over the flags; otherwise verbose > quiet > default.
fn console_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(console_directive(verbose, quiet))
}

fn console_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        VERBOSE_LOG_FILTER
    } else if quiet {
        "warn"
    } else {
        DEFAULT_LOG_FILTER
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
