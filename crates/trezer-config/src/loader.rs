//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::env;
use std::fs;
use std::path::Path;

use crate::duration::parse_duration;
use crate::{ConfigError, LogFormat, TrezerConfig};

/// Flat variables set on deployed functions.
pub mod vars {
    /// Deployment environment name.
    pub const ENVIRONMENT: &str = "ENVIRONMENT";
    /// Log filter directive.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// Database user.
    pub const SQL_USER: &str = "SQL_USER";
    /// Database password.
    pub const SQL_PASSWORD: &str = "SQL_PASSWORD";
    /// Database host.
    pub const SQL_HOST: &str = "SQL_HOST";
    /// Database port.
    pub const SQL_PORT: &str = "SQL_PORT";
    /// Database name.
    pub const SQL_DATABASE: &str = "SQL_DATABASE";
    /// Connection idle timeout, as a duration string.
    pub const SQL_CONNECTION_MAX_IDLE_TIME: &str = "SQL_CONNECTION_MAX_IDLE_TIME";
    /// Connection max lifetime, as a duration string.
    pub const SQL_CONNECTION_MAX_LIFE_TIME: &str = "SQL_CONNECTION_MAX_LIFE_TIME";
}

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. Flat deployment variables ([`with_lambda_env`](Self::with_lambda_env))
/// 4. Prefixed environment variables ([`with_env_prefix`](Self::with_env_prefix))
///
/// # Example
///
/// ```no_run
/// use trezer_config::ConfigLoader;
///
/// # fn main() -> Result<(), trezer_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("trezer.toml")?
///     .with_lambda_env()?
///     .with_env_prefix("TREZER")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: TrezerConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: TrezerConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with development preset configuration.
    ///
    /// ```
    /// use trezer_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TrezerConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TrezerConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats.
    /// The file format is determined by the file extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - File format ("toml" or "json")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use trezer_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     environment = "DEV"
    ///
    ///     [logging]
    ///     level = "warn"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.environment, "DEV");
    /// assert_eq!(config.logging.level, "warn");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat(format.to_string()))
            }
        };
        Ok(self)
    }

    /// Load a `.env` file into the process environment, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(ConfigError::Dotenv(err.to_string())),
        }
    }

    /// Set environment variable prefix for overrides, applied by [`load`](Self::load).
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "TREZER":
    /// - `TREZER__ENVIRONMENT=DEV`
    /// - `TREZER__LOGGING__LEVEL=debug`
    /// - `TREZER__SQL__CONNECTION_MAX_IDLE_TIME=30s`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply the flat deployment variables from the process environment.
    ///
    /// See [`vars`] for the names. Unset or empty variables leave the
    /// current value untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Variable` naming the variable if a port or
    /// duration cannot be parsed.
    pub fn with_lambda_env(self) -> Result<Self, ConfigError> {
        self.with_lambda_vars(env::vars())
    }

    /// Apply flat deployment variables from an explicit source.
    ///
    /// # Errors
    ///
    /// Same as [`with_lambda_env`](Self::with_lambda_env).
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use trezer_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_lambda_vars([
    ///         ("SQL_HOST", "db"),
    ///         ("SQL_DATABASE", "pets"),
    ///         ("SQL_CONNECTION_MAX_IDLE_TIME", "30s"),
    ///         ("SQL_CONNECTION_MAX_LIFE_TIME", "5m"),
    ///     ])
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.sql.connection_max_life_time, Some(Duration::from_secs(300)));
    /// ```
    pub fn with_lambda_vars<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.is_empty() {
                continue;
            }
            self.apply_lambda_var(key, value)?;
        }
        Ok(self)
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies prefixed environment variable overrides (if a prefix was set)
    /// and validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<TrezerConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_prefixed_vars(&prefix, env::vars())?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TrezerConfig {
        self.config
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<TrezerConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_lambda_var(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let sql = &mut self.config.sql;
        match key {
            vars::ENVIRONMENT => self.config.environment = value.to_string(),
            vars::LOG_LEVEL => self.config.logging.level = value.to_string(),
            vars::SQL_USER => sql.user = value.to_string(),
            vars::SQL_PASSWORD => sql.password = value.to_string(),
            vars::SQL_HOST => sql.host = value.to_string(),
            vars::SQL_PORT => sql.port = parse_port(key, value)?,
            vars::SQL_DATABASE => sql.database = value.to_string(),
            vars::SQL_CONNECTION_MAX_IDLE_TIME => {
                sql.connection_max_idle_time = Some(parse_env_duration(key, value)?);
            }
            vars::SQL_CONNECTION_MAX_LIFE_TIME => {
                sql.connection_max_life_time = Some(parse_env_duration(key, value)?);
            }
            _ => {}
        }
        Ok(())
    }

    // Apply every `PREFIX__SECTION__KEY` variable
    fn apply_prefixed_vars<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let head = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(path) = key.strip_prefix(&head) {
                let parts: Vec<&str> = path.split("__").collect();
                self.apply_prefixed_var(&key, &parts, &value)?;
            }
        }
        Ok(())
    }

    fn apply_prefixed_var(
        &mut self,
        key: &str,
        parts: &[&str],
        value: &str,
    ) -> Result<(), ConfigError> {
        let sql = &mut self.config.sql;
        match parts {
            ["ENVIRONMENT"] => self.config.environment = value.to_string(),

            // Logging section
            ["LOGGING", "LEVEL"] => self.config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::variable(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            // SQL section
            ["SQL", "USER"] => sql.user = value.to_string(),
            ["SQL", "PASSWORD"] => sql.password = value.to_string(),
            ["SQL", "HOST"] => sql.host = value.to_string(),
            ["SQL", "PORT"] => sql.port = parse_port(key, value)?,
            ["SQL", "DATABASE"] => sql.database = value.to_string(),
            ["SQL", "CONNECTION_MAX_IDLE_TIME"] => {
                sql.connection_max_idle_time = Some(parse_env_duration(key, value)?);
            }
            ["SQL", "CONNECTION_MAX_LIFE_TIME"] => {
                sql.connection_max_life_time = Some(parse_env_duration(key, value)?);
            }

            // Unknown key - ignore
            _ => {}
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::variable(key, "expected a port number"))
}

fn parse_env_duration(key: &str, value: &str) -> Result<std::time::Duration, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::variable(key, e.to_string()))
}
