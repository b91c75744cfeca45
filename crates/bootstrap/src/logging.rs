//! Tracing subscriber setup.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_FILE: &str = "kubemon.log";

/// Platform log directory.
///
/// - macOS: `~/Library/Caches/kubemon/logs`
/// - Linux: `~/.cache/kubemon/logs` (or `$XDG_CACHE_HOME/kubemon/logs`)
/// - Windows: `%LOCALAPPDATA%\kubemon\cache\logs`
/// - Fallback: `/tmp/kubemon/logs`
pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "kubemon")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/tmp/kubemon"))
        .join("logs")
}

/// Install the global subscriber.
///
/// Logs always go to stderr. With file logging enabled they are also written
/// to `kubemon.log`; keep the returned guard alive until exit so buffered
/// lines are flushed. `RUST_LOG` overrides the default `info` filter.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard, file_path) = if config.to_file {
        let dir = config.dir.clone().unwrap_or_else(log_dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard), Some(dir.join(LOG_FILE)))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = file_path {
        tracing::info!("Log file: {}", path.display());
    }

    Ok(guard)
}
