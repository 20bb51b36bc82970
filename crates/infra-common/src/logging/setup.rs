use crate::errors::types::{Error, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::fmt::format::FmtSpan;
use std::str::FromStr;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
    /// Application name to include in the welcome line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "faxgw".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Set up the global tracing subscriber.
///
/// `RUST_LOG` directives are honoured on top of the configured level. Fails if
/// a global subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_thread_names(true);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| Error::Config(format!("Failed to install log subscriber: {}", e)))
}

/// Parse a log level from a string.
///
/// Besides the tracing names this accepts the short severity names used in
/// gateway traces: `err`, `warn`, `info`, `debg`.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_ascii_lowercase().as_str() {
        "err" => Ok(Level::ERROR),
        "debg" => Ok(Level::DEBUG),
        other => Level::from_str(other)
            .map_err(|_| Error::Config(format!("Invalid log level: {}", level))),
    }
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level_aliases() {
        assert_eq!(parse_log_level("err").unwrap(), Level::ERROR);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("debg").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_config_builders() {
        let config = LoggingConfig::new(Level::DEBUG, "faxgw-test")
            .with_json()
            .with_file_info();
        assert!(config.json);
        assert!(config.file_info);
        assert!(!config.log_spans);
        assert_eq!(config.app_name, "faxgw-test");
    }
}
