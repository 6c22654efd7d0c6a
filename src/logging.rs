//! Structured logging setup.
//!
//! Console output plus an optional daily rolling file. Old rolled files are
//! pruned before the appender starts so the log directory stays bounded.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Maximum number of rolled log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// File name prefix for rolled logs (`khqr.2026-10-19`, ...).
pub const LOG_FILE_PREFIX: &str = "khqr";

const DEFAULT_FILTER: &str = "info,khqr_pay=debug";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: Option<String>,
    /// Directory for rolling log files. Console only when absent.
    pub dir: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; dropping it
/// flushes and stops the background writer, so keep it alive for the life of
/// the process. Calling this twice is harmless: the second call leaves the
/// first subscriber in place.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });

    let console_layer = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let (file_layer, guard) = match config.dir.as_deref() {
        Some(dir) => {
            prune_old_logs(dir, MAX_LOG_FILES);
            if let Err(e) = fs::create_dir_all(dir) {
                eprintln!("cannot create log directory {}: {e}", dir.display());
                (None, None)
            } else {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        warn!("tracing subscriber already installed; keeping the existing one");
    }
    guard
}

/// Delete rolled log files beyond the newest `keep`.
pub fn prune_old_logs(dir: &Path, keep: usize) -> usize {
    if !dir.exists() {
        return 0;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|name| name.starts_with(&format!("{LOG_FILE_PREFIX}.")))
                .unwrap_or(false);
            if is_log {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(std::time::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}
