//! # Local Tracing Setup
//!
//! Installs a `tracing` subscriber with an optional console layer and a file
//! layer (plain text or JSON). Each process start opens a fresh timestamped
//! log file; older files of the same application are deleted so only the
//! newest one survives.

use std::path::{Path, PathBuf};

use chrono::Local;
use glob::glob;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, TremError};

/// Options for [`init_tracing`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggerOptions {
    /// Application name, used as the log file prefix.
    pub app_name: String,
    /// Directory for log files. Defaults to `./logs`.
    pub log_dir: Option<PathBuf>,
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Write the file layer as JSON lines.
    pub json: bool,
    /// Also print to the console.
    pub use_tty: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            app_name: "trem".to_string(),
            log_dir: None,
            level: "info".to_string(),
            json: false,
            use_tty: true,
        }
    }
}

/// Deletes every `<app_name>-*.log` in `log_dir` except the newest.
///
/// File names embed a sortable timestamp, so name order is age order.
pub fn rotate_logs(app_name: &str, log_dir: &Path) {
    let pattern = format!("{}/{}-*.log", log_dir.display(), app_name);
    let mut log_files: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            eprintln!("Invalid log rotation pattern {}: {}", pattern, e);
            return;
        }
    };

    log_files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    for old_file in log_files.iter().skip(1) {
        if let Err(e) = std::fs::remove_file(old_file) {
            eprintln!("Error deleting old log file {}: {}", old_file.display(), e);
        }
    }
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the process, dropping it flushes the file writer.
pub fn init_tracing(options: &LoggerOptions) -> Result<WorkerGuard> {
    let log_dir = options.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    std::fs::create_dir_all(&log_dir)?;

    rotate_logs(&options.app_name, &log_dir);

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let file_name = format!("{}-{}.log", options.app_name, timestamp);
    let appender = tracing_appender::rolling::never(&log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&options.level))
        .map_err(|e| TremError::Config(format!("invalid log level '{}': {}", options.level, e)))?;

    let (json_layer, text_layer) = if options.json {
        (Some(fmt::layer().json().with_writer(writer)), None)
    } else {
        (None, Some(fmt::layer().with_ansi(false).with_writer(writer)))
    };
    let console_layer = options.use_tty.then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| TremError::Config(format!("tracing already initialised: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_only_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
            std::fs::write(dir.path().join(format!("trem-{}.log", stamp)), b"x").unwrap();
        }
        std::fs::write(dir.path().join("other-20240101_000000.log"), b"x").unwrap();

        rotate_logs("trem", dir.path());

        assert!(dir.path().join("trem-20240103_000000.log").exists());
        assert!(!dir.path().join("trem-20240101_000000.log").exists());
        assert!(!dir.path().join("trem-20240102_000000.log").exists());
        assert!(dir.path().join("other-20240101_000000.log").exists());
    }
}
