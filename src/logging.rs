//! Logging initialization for smartstart.
//!
//! Interactive wizard: logs to `<data_dir>/logs/smartstart-{datetime}.log`
//! so tracing output does not interleave with prompts.
//! Other commands: logs to stderr

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered log lines when dropped; keep it alive until exit
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set for the interactive wizard with file logging)
    pub log_file_path: Option<PathBuf>,
}

/// Log file name for a session started now
fn log_file_name() -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    format!("smartstart-{timestamp}.log")
}

/// Whether logs go to a file rather than stderr
fn logs_to_file(config: &Config, interactive: bool) -> bool {
    interactive && config.logging.to_file
}

fn level_filter(config: &Config, debug_override: bool) -> tracing_subscriber::EnvFilter {
    let log_level = if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(log_level))
}

fn file_writer(logs_dir: &Path) -> Result<(PathBuf, tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;

    let filename = log_file_name();
    let path = logs_dir.join(&filename);
    let appender = tracing_appender::rolling::never(logs_dir, &filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((path, writer, guard))
}

/// Initialize logging for this process.
///
/// `debug_override` forces the `debug` level (the `--debug` flag). `RUST_LOG`
/// wins over both.
pub fn init_logging(
    config: &Config,
    interactive: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let filter = level_filter(config, debug_override);

    if logs_to_file(config, interactive) {
        let (log_file_path, writer, guard) = file_writer(&config.logs_path())?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}
