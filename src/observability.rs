// SPDX-License-Identifier: Apache-2.0

//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Deserialize;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "fedbridge.log";
const DEFAULT_FILTER: &str = "fedbridge=info";
const DEFAULT_RETENTION_DAYS: u64 = 14;

/// Logging setup for the embedding host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// EnvFilter directives; `RUST_LOG` wins when set
    pub filter: Option<String>,
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
    /// Write daily-rotated files here instead of stderr
    pub directory: Option<PathBuf>,
    pub retention_days: Option<u64>,
}

/// Installs the global subscriber. Returns false if one was already set.
pub fn init_tracing(config: &LogConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER))
    });

    let installed = match &config.directory {
        Some(dir) => {
            let _ = fs::create_dir_all(dir);
            let retention = config.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
            if let Err(e) = cleanup_old_logs(dir, retention) {
                eprintln!("Failed to clean up old logs: {}", e);
            }

            let file_appender: RollingFileAppender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .with_thread_names(true)
                .with_span_events(FmtSpan::CLOSE);
            if config.json {
                builder
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .try_init()
                    .is_ok()
            } else {
                builder.try_init().is_ok()
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr);
            if config.json {
                builder.json().try_init().is_ok()
            } else {
                builder.try_init().is_ok()
            }
        }
    };

    if installed {
        tracing::info!(directory = ?config.directory, json = config.json, "Tracing initialized");
    }
    installed
}

/// Removes rotated log files older than `retention_days`.
fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let mut removed = 0;

    for entry in fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if matches!(age, Some(age) if age > retention) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => eprintln!("Failed to remove old log file {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}
