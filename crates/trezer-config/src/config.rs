//! Main configuration type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, LoggingConfig, SqlConfig};

/// Environment name of a developer machine.
pub const LOCAL_ENVIRONMENT: &str = "LOCAL";

/// Complete function configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use trezer_config::TrezerConfig;
///
/// let config = TrezerConfig::default();
/// assert_eq!(config.logging.level, "info");
/// assert!(!config.sql.is_configured());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrezerConfig {
    /// Deployment environment name (`LOCAL`, `DEV`, `PROD`, ...).
    #[serde(default)]
    pub environment: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// SQL connection configuration.
    #[serde(default)]
    pub sql: SqlConfig,
}

impl TrezerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the offending field if:
    /// - The log level is empty
    /// - SQL is configured with port 0 or without a database name
    /// - SQL is configured without both connection durations
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }

        if !self.sql.is_configured() {
            return Ok(());
        }

        if self.sql.port == 0 {
            return Err(ConfigError::invalid("sql.port", "must be non-zero"));
        }
        if self.sql.database.is_empty() {
            return Err(ConfigError::missing("sql.database"));
        }
        if self.sql.connection_max_idle_time.is_none() {
            return Err(ConfigError::missing("sql.connection_max_idle_time"));
        }
        if self.sql.connection_max_life_time.is_none() {
            return Err(ConfigError::missing("sql.connection_max_life_time"));
        }

        Ok(())
    }

    /// Returns true when running on a developer machine.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.environment.eq_ignore_ascii_case(LOCAL_ENVIRONMENT)
    }

    /// Create a development configuration preset.
    ///
    /// ```
    /// use trezer_config::{LogFormat, TrezerConfig};
    ///
    /// let config = TrezerConfig::development();
    /// assert!(config.is_local());
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.environment = LOCAL_ENVIRONMENT.to_string();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Create a production configuration preset.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.environment = "PROD".to_string();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sql() -> SqlConfig {
        SqlConfig {
            user: "pets".to_string(),
            password: "secret".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "pets".to_string(),
            connection_max_idle_time: Some(Duration::from_secs(30)),
            connection_max_life_time: Some(Duration::from_secs(300)),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(TrezerConfig::default().validate().is_ok());
        assert!(TrezerConfig::development().validate().is_ok());
        assert!(TrezerConfig::production().validate().is_ok());
    }

    #[test]
    fn test_sql_requires_durations() {
        let mut config = TrezerConfig {
            sql: sql(),
            ..TrezerConfig::default()
        };
        assert!(config.validate().is_ok());

        config.sql.connection_max_idle_time = None;
        let err = config.validate().unwrap_err();
        assert!(err.concerns("SQL_CONNECTION_MAX_IDLE_TIME"));

        config.sql.connection_max_idle_time = Some(Duration::from_secs(1));
        config.sql.connection_max_life_time = None;
        let err = config.validate().unwrap_err();
        assert!(err.concerns("SQL_CONNECTION_MAX_LIFE_TIME"));
    }

    #[test]
    fn test_sql_rejects_zero_port() {
        let config = TrezerConfig {
            sql: SqlConfig { port: 0, ..sql() },
            ..TrezerConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().key(), Some("sql.port"));
    }

    #[test]
    fn test_empty_level_rejected() {
        let mut config = TrezerConfig::default();
        config.logging.level = " ".to_string();
        assert!(config.validate().is_err());
    }
}
