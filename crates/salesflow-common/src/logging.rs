//! Logging Configuration and Initialization
//!
//! Every pipeline run writes to two daily rolling files in the log directory:
//!
//! - `<prefix>.<date>.log`: everything at or above the configured level
//! - `<prefix>-error.<date>.log`: `ERROR` events only
//!
//! and optionally mirrors the full stream to the console. Old files are
//! removed by [`sweep_old_logs`], which the pipeline calls during cleanup.
//!
//! Use the `tracing` macros with structured fields, never `println!`:
//!
//! ```rust,ignore
//! use tracing::{info, error};
//!
//! info!(source = %kind, rows = kept, "Normalized source");
//! error!(error = %err, step = %state, "Pipeline step failed");
//! ```
//!
//! # Example
//!
//! ```no_run
//! use salesflow_common::logging::{LogConfig, init_logging};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!
//!     info!("Pipeline started");
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Default number of days log files are kept
pub const DEFAULT_LOG_RETENTION_DAYS: u64 = 7;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(anyhow::anyhow!("Invalid log level: {}", s)),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Minimum log level written to the console and the main log
    pub level: LogLevel,

    pub format: LogFormat,

    /// Mirror the main log to stdout
    pub console: bool,

    /// Directory holding the daily log files
    pub log_dir: PathBuf,

    /// Log file name prefix (e.g. "salesflow" -> "salesflow.2024-01-18.log")
    pub log_file_prefix: String,

    /// Additional filter directives (e.g. "sqlx=warn,reqwest=info")
    pub filter_directives: Option<String>,

    /// Files older than this many days are removed by the retention sweep
    pub retention_days: u64,

    /// Whether to include file and line number in logs
    pub include_location: bool,

    /// Whether to include target module names in logs
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            console: true,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "salesflow".to_string(),
            filter_directives: None,
            retention_days: DEFAULT_LOG_RETENTION_DAYS,
            include_location: false,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LOG_LEVEL`: Log level (trace, debug, info, warn, error)
    /// - `LOG_FORMAT`: Log format (text, json)
    /// - `LOG_CONSOLE`: Mirror logs to stdout (true/false)
    /// - `LOG_DIR`: Directory for log files
    /// - `LOG_FILE_PREFIX`: Prefix for log files
    /// - `LOG_FILTER`: Additional filter directives
    /// - `LOG_RETENTION_DAYS`: Days to keep log files
    /// - `LOG_INCLUDE_LOCATION`: Include file/line in logs (true/false)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level.parse()?;
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }

        if let Some(val) = lookup("LOG_CONSOLE") {
            config.console = val.parse().unwrap_or(true);
        }

        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Some(prefix) = lookup("LOG_FILE_PREFIX") {
            config.log_file_prefix = prefix;
        }

        if let Some(filter) = lookup("LOG_FILTER") {
            config.filter_directives = Some(filter);
        }

        if let Some(days) = lookup("LOG_RETENTION_DAYS") {
            config.retention_days = days
                .parse()
                .with_context(|| format!("Invalid LOG_RETENTION_DAYS: {}", days))?;
        }

        if let Some(val) = lookup("LOG_INCLUDE_LOCATION") {
            config.include_location = val.parse().unwrap_or(false);
        }

        Ok(config)
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// File name prefix of the error-only log
    pub fn error_file_prefix(&self) -> String {
        format!("{}-error", self.log_file_prefix)
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn console(mut self, console: bool) -> Self {
        self.config.console = console;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn retention_days(mut self, days: u64) -> Self {
        self.config.retention_days = days;
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Keeps the non-blocking file writers alive.
///
/// Dropping the guard flushes buffered lines, so hold it until the process
/// is about to exit.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging with the given configuration
///
/// Installs the global tracing subscriber. Call once at startup and keep the
/// returned guard alive for the lifetime of the run.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(config.level.to_tracing_level().into());

    if let Some(ref directives) = config.filter_directives {
        for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
            filter = filter.add_directive(
                directive
                    .trim()
                    .parse()
                    .context("Failed to parse filter directive")?,
            );
        }
    }

    std::fs::create_dir_all(&config.log_dir).context("Failed to create log directory")?;

    let main_appender = daily_appender(&config.log_dir, &config.log_file_prefix)?;
    let error_appender = daily_appender(&config.log_dir, &config.error_file_prefix())?;

    let (main_writer, main_guard) = tracing_appender::non_blocking(main_appender);
    let (error_writer, error_guard) = tracing_appender::non_blocking(error_appender);

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console {
        let console = fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(config.include_targets)
            .with_file(config.include_location)
            .with_line_number(config.include_location);
        layers.push(match config.format {
            LogFormat::Text => console.boxed(),
            LogFormat::Json => console.json().boxed(),
        });
    }

    let main_file = fmt::layer()
        .with_writer(main_writer)
        .with_target(config.include_targets)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(false);
    layers.push(match config.format {
        LogFormat::Text => main_file.boxed(),
        LogFormat::Json => main_file.json().boxed(),
    });

    let error_file = fmt::layer()
        .with_writer(error_writer)
        .with_target(config.include_targets)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);
    layers.push(error_file.boxed());

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(LogGuard {
        _guards: vec![main_guard, error_guard],
    })
}

fn daily_appender(dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to create log appender '{}'", prefix))
}

/// Delete log files older than `retention_days`.
///
/// Only regular files whose name starts with `prefix` and ends in `.log` are
/// considered, which covers both the main and the error log. Returns the
/// number of files removed.
pub fn sweep_old_logs(
    log_dir: &Path,
    prefix: &str,
    retention_days: u64,
    now: SystemTime,
) -> crate::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let max_age = Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));
    let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(prefix) || !name.ends_with(".log") {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        if metadata.modified()? < cutoff {
            std::fs::remove_file(entry.path())?;
            debug!(file = %name, "Removed expired log file");
            removed += 1;
        }
    }

    Ok(removed)
}
