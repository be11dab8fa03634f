//! Logging setup: an append-only log file plus an optional console layer

use crate::error::{Result, TrackerError};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt,
    EnvFilter, Registry,
};

const TIME_FORMAT: &str = "%d-%m-%y %H:%M:%S";

/// Options for [`init_logging`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Minimum level, one of ERROR, WARN, INFO, DEBUG, TRACE
    pub min_level: String,
    /// Log file, opened in append mode
    pub file: Option<PathBuf>,
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: "DEBUG".to_string(),
            file: None,
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    /// Level filter for `min_level`, TRACE when the name is unknown
    pub fn level_filter(&self) -> LevelFilter {
        string_to_level(&self.min_level)
            .map(LevelFilter::from_level)
            .unwrap_or(LevelFilter::TRACE)
    }
}

/// Install the global subscriber
///
/// `RUST_LOG`, when set, takes precedence over `min_level`. Fails if the log
/// file cannot be opened or a subscriber is already set.
pub fn init_logging(options: &LoggingOptions) -> Result<()> {
    let file_layer = match &options.file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .map_err(|err| TrackerError::Logging(format!("{}: {err}", dir.display())))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| TrackerError::Logging(format!("{}: {err}", path.display())))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let console_layer = options.enable_console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    let filter = EnvFilter::builder()
        .with_default_directive(options.level_filter().into())
        .from_env_lossy();

    Registry::default()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| TrackerError::Logging(err.to_string()))
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
