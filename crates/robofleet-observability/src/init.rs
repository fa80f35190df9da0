// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console output is always available. With the `file-logging` feature a
//! timestamped run folder receives a combined JSON log, and old run folders
//! are pruned.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, LoggingConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn console_layer(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> BoxedLayer {
    let env_filter = EnvFilter::new(debug_flags.to_filter_string(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    }
}

/// Install a console subscriber.
///
/// Fails if a global subscriber is already installed (tests and embedding
/// hosts commonly install their own), which callers may ignore.
pub fn init_console_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<()> {
    Registry::default()
        .with(vec![console_layer(debug_flags, config)])
        .try_init()
        .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(feature = "file-logging")]
pub use file::{init_logging, LoggingGuard};

#[cfg(feature = "file-logging")]
mod file {
    use super::*;
    use anyhow::Context;
    use chrono::Utc;
    use std::path::{Path, PathBuf};
    use tracing_appender::rolling;

    /// Keeps the non-blocking writer alive; logs flush when dropped
    pub struct LoggingGuard {
        _file_guard: tracing_appender::non_blocking::WorkerGuard,
        log_dir: PathBuf,
    }

    impl LoggingGuard {
        pub fn log_dir(&self) -> &Path {
            &self.log_dir
        }
    }

    /// Initialize logging with console output plus a combined JSON file
    ///
    /// ```text
    /// ./logs/
    ///   └── run_20250101_120000/
    ///       └── robofleet.log
    /// ```
    pub fn init_logging(
        debug_flags: &CrateDebugFlags,
        config: &LoggingConfig,
    ) -> Result<LoggingGuard> {
        let base_log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./logs"));

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let run_folder = base_log_dir.join(format!("run_{}", timestamp));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        cleanup_old_runs(&base_log_dir, config.retention_runs)?;

        let combined_appender = rolling::never(&run_folder, "robofleet.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(combined_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(EnvFilter::new(debug_flags.to_filter_string(&config.level)))
            .boxed();

        Registry::default()
            .with(vec![console_layer(debug_flags, config), file_layer])
            .try_init()
            .map_err(|e| anyhow!("Failed to install log subscriber: {}", e))?;

        Ok(LoggingGuard {
            _file_guard: guard,
            log_dir: run_folder,
        })
    }

    /// Keep only the most recent `retention_runs` run folders
    pub(crate) fn cleanup_old_runs(base_log_dir: &Path, retention_runs: usize) -> Result<()> {
        if !base_log_dir.exists() {
            return Ok(());
        }

        // run_YYYYmmdd_HHMMSS sorts chronologically as a string
        let mut runs: Vec<PathBuf> = std::fs::read_dir(base_log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, |n| n.starts_with("run_"))
            })
            .collect();
        runs.sort();

        if runs.len() > retention_runs {
            let to_remove = runs.len() - retention_runs;
            for path in runs.iter().take(to_remove) {
                if let Err(e) = std::fs::remove_dir_all(path) {
                    eprintln!(
                        "Warning: Failed to remove old log directory {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(())
    }

}
