//! Logging configuration and initialization
//!
//! Provides structured logging with tracing, supporting console output,
//! file logging, and JSON format for production.
//!
//! - `BORDER_MAKER_LOG`: filter directives, falling back to `RUST_LOG`
//! - `BORDER_MAKER_LOG_FORMAT=json`: JSON console output
//! - `BORDER_MAKER_LOG_FILE`: append logs to this file (read by [`LogConfig::from_env`])

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Path for the log file (default: None, uses `border-maker.log`)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Overlay `BORDER_MAKER_LOG_FILE` on the defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`LogConfig::from_env`], reading variables through `lookup`.
    /// An empty `BORDER_MAKER_LOG_FILE` leaves file logging off.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup("BORDER_MAKER_LOG_FILE").filter(|p| !p.trim().is_empty()) {
            config.file_enabled = true;
            config.file_path = Some(PathBuf::from(path));
        }
        config
    }
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// to ensure file logging is properly flushed.
///
/// # Environment Variables
///
/// - `BORDER_MAKER_LOG`: Set log level filter (e.g., "debug", "info,border_maker=debug")
/// - `BORDER_MAKER_LOG_FORMAT`: Set to "json" for JSON output
///
/// The log file itself is chosen by `config.file_path`; see [`LogConfig::from_env`]
/// for `BORDER_MAKER_LOG_FILE`.
///
/// # Example
///
/// ```no_run
/// use border_maker::telemetry::{init_logging, LogConfig};
///
/// let config = LogConfig::default();
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// // Keep _guard alive for the program duration
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    // BORDER_MAKER_LOG first, then RUST_LOG, then the config default
    let env_filter = EnvFilter::try_from_env("BORDER_MAKER_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = std::env::var("BORDER_MAKER_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(config.json_format);

    let mut file_guard: Option<WorkerGuard> = None;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.file_enabled {
        let log_path = config.file_path.clone().unwrap_or_else(|| PathBuf::from("border-maker.log"));
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&log_path)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        if config.console_enabled {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact();

            subscriber.with(file_layer).with(console_layer).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }

        eprintln!("Logging to file: {}", log_path.display());
    } else if config.console_enabled {
        if use_json {
            // JSON format for log aggregation
            let json_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            subscriber.with(json_layer).try_init()?;
        } else {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact();

            subscriber.with(console_layer).try_init()?;
        }
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        target: "border_maker",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(config.file_path.is_none());
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
    }

    #[test]
    fn test_log_file_from_lookup() {
        let config = LogConfig::from_lookup(|key| (key == "BORDER_MAKER_LOG_FILE").then(|| "/tmp/bm.log".to_string()));
        assert!(config.file_enabled);
        assert_eq!(config.file_path, Some(PathBuf::from("/tmp/bm.log")));

        let config = LogConfig::from_lookup(|_| Some(String::new()));
        assert!(!config.file_enabled);
        assert!(LogConfig::from_lookup(|_| None).file_path.is_none());
    }
}
