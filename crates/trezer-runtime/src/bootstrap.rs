//! Process bootstrap: configuration and logging before the first
//! invocation.

use std::env;
use trezer_config::{vars, ConfigLoader, LogFormat, TrezerConfig};
use trezer_telemetry::{try_init_logging, LogConfig};

use crate::RuntimeError;

/// Optional configuration file read from the working directory.
pub const CONFIG_FILE: &str = "trezer.toml";

/// Prefix of structured environment overrides (`TREZER__LOGGING__LEVEL`).
pub const ENV_PREFIX: &str = "TREZER";

/// Loads the process configuration.
///
/// Layers, later ones winning: defaults, `.env`, [`CONFIG_FILE`], the
/// `ENVIRONMENT` and `LOG_LEVEL` variables, then `TREZER__*` overrides.
/// `SQL_*` variables are left to the SQL connector, which reads them during
/// Setup so a bad value becomes a retried fault instead of a failed start.
///
/// # Errors
///
/// Returns [`RuntimeError::Config`] if a source cannot be read or the result
/// is invalid.
pub fn load_config() -> Result<TrezerConfig, RuntimeError> {
    let flat = env::vars().filter(|(key, _)| key == vars::ENVIRONMENT || key == vars::LOG_LEVEL);
    let config = ConfigLoader::new()
        .with_dotenv()?
        .with_optional_file(CONFIG_FILE)?
        .with_lambda_vars(flat)?
        .with_env_prefix(ENV_PREFIX)
        .load()?;
    Ok(config)
}

/// Derives the subscriber settings from the process configuration.
///
/// ```
/// use trezer_config::TrezerConfig;
/// use trezer_runtime::log_config;
///
/// let config = log_config(&TrezerConfig::development());
/// assert!(!config.json_format);
/// assert_eq!(config.level, "debug");
/// ```
pub fn log_config(config: &TrezerConfig) -> LogConfig {
    let preset = LogConfig::from_environment(&config.environment);
    LogConfig {
        json_format: config.logging.format == LogFormat::Json,
        ..preset
    }
    .with_level(config.logging.level.clone())
}

/// Installs the global subscriber for `config`.
///
/// Returns `false` when a subscriber was already installed.
///
/// # Errors
///
/// Returns [`RuntimeError::Logging`] for an invalid level directive.
pub fn init_logging(config: &TrezerConfig) -> Result<bool, RuntimeError> {
    Ok(try_init_logging(&log_config(config))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_production() {
        let config = log_config(&TrezerConfig::production());
        assert!(config.json_format);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_log_config_format_override() {
        let mut config = TrezerConfig::production();
        config.logging.format = LogFormat::Pretty;
        config.logging.level = "trezer=trace".to_string();

        let log = log_config(&config);
        assert!(!log.json_format);
        assert_eq!(log.level, "trezer=trace");
    }
}
