//! Subscriber initialisation.
//!
//! # Features
//!
//! - JSON output for deployed functions
//! - Pretty console output for local runs
//! - Level filtering through `EnvFilter` directives
//! - Idempotent initialisation, so a retried Setup does not fail on the
//!   already-installed subscriber

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Environment name that selects the development preset.
pub const LOCAL_ENVIRONMENT: &str = "LOCAL";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g., "info", "trezer_sql=debug,info").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include span events (new, close).
    pub span_events: bool,

    /// Whether to include file/line info.
    pub file_line_info: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
        }
    }

    /// Creates a production configuration with JSON output.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
        }
    }

    /// Picks the preset for a deployment environment name.
    ///
    /// `LOCAL` (case-insensitive) selects [`development`](Self::development),
    /// anything else [`production`](Self::production).
    #[must_use]
    pub fn from_environment(environment: &str) -> Self {
        if environment.eq_ignore_ascii_case(LOCAL_ENVIRONMENT) {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Overrides the filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for an unparsable level and
/// `TelemetryError::LoggingInit` if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    Ok(())
}

/// Initializes the global subscriber unless one is already installed.
///
/// Returns `Ok(true)` when this call installed the subscriber and `Ok(false)`
/// when logging was disabled or a subscriber was already present.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` for an unparsable level.
pub fn try_init_logging(config: &LogConfig) -> TelemetryResult<bool> {
    // Validate first so a bad level is reported even on a warm instance.
    create_env_filter(&config.level)?;

    if !config.enabled || tracing::dispatcher::has_been_set() {
        return Ok(false);
    }

    match init_logging(config) {
        Ok(()) => Ok(true),
        // Lost a race with another initialiser.
        Err(TelemetryError::LoggingInit(_)) if tracing::dispatcher::has_been_set() => Ok(false),
        Err(err) => Err(err),
    }
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidConfig` if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::InvalidConfig(format!("Invalid log level '{filter}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert!(config.file_line_info);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_from_environment() {
        assert_eq!(LogConfig::from_environment("LOCAL"), LogConfig::development());
        assert_eq!(LogConfig::from_environment("local"), LogConfig::development());
        assert_eq!(LogConfig::from_environment("PROD"), LogConfig::production());
        assert_eq!(LogConfig::from_environment(""), LogConfig::production());
    }

    #[test]
    fn test_with_level() {
        let config = LogConfig::production().with_level("warn");
        assert_eq!(config.level, "warn");
        assert!(config.json_format);
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("trezer_sql=debug,info").is_ok());
        assert!(matches!(
            create_env_filter("trezer=loud"),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(init_logging(&config).is_ok());
        assert!(!try_init_logging(&config).unwrap());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let config = LogConfig::production().with_level("off");
        try_init_logging(&config).unwrap();
        assert!(!try_init_logging(&config).unwrap());
    }
}
