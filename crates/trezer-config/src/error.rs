//! Configuration errors.
//!
//! Errors about a single setting carry its [`key`](ConfigError::key), either
//! as a dotted field path (`sql.connection_max_idle_time`) or as the
//! deployment variable it came from (`SQL_CONNECTION_MAX_IDLE_TIME`). The SQL
//! connector uses that key to pick the fault code it reports.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a [`TrezerConfig`](crate::TrezerConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file {path} does not exist")]
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// A configuration file exists but cannot be read.
    #[error("cannot read configuration file {path}")]
    Unreadable {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A TOML document did not match the configuration schema.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON document did not match the configuration schema.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format `{0}`")]
    UnsupportedFormat(String),

    /// The `.env` file exists but cannot be parsed.
    #[error("invalid .env file: {0}")]
    Dotenv(String),

    /// A deployment variable holds an unusable value.
    #[error("{var} is not usable: {reason}")]
    Variable {
        /// Variable name, e.g. `SQL_PORT`.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A loaded setting has an unusable value.
    #[error("{field} {reason}")]
    Invalid {
        /// Dotted field path, e.g. `sql.port`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A required setting is absent.
    #[error("{field} is required")]
    Missing {
        /// Dotted field path, e.g. `sql.database`.
        field: String,
    },
}

impl ConfigError {
    /// The requested file does not exist.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// The file at `path` cannot be read.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// The variable `var` holds an unusable value.
    pub fn variable(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Variable {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// The setting at `field` has an unusable value.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The setting at `field` is required but absent.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    /// The field or variable the error is about, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } | Self::Missing { field } => Some(field),
            Self::Variable { var, .. } => Some(var),
            _ => None,
        }
    }

    /// Returns true if the error is about `name`, matching field paths and
    /// variable names alike.
    ///
    /// ```
    /// use trezer_config::ConfigError;
    ///
    /// let err = ConfigError::missing("sql.connection_max_idle_time");
    /// assert!(err.concerns("SQL_CONNECTION_MAX_IDLE_TIME"));
    /// ```
    #[must_use]
    pub fn concerns(&self, name: &str) -> bool {
        let normalize = |s: &str| s.replace('.', "_").to_ascii_uppercase();
        self.key()
            .is_some_and(|key| normalize(key) == normalize(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_names_the_deployment_variable() {
        let err = ConfigError::variable("SQL_CONNECTION_MAX_IDLE_TIME", "invalid duration `soon`");
        assert_eq!(
            err.to_string(),
            "SQL_CONNECTION_MAX_IDLE_TIME is not usable: invalid duration `soon`"
        );
        assert_eq!(err.key(), Some("SQL_CONNECTION_MAX_IDLE_TIME"));
    }

    #[test]
    fn test_missing_sql_duration() {
        let err = ConfigError::missing("sql.connection_max_life_time");
        assert_eq!(err.to_string(), "sql.connection_max_life_time is required");
        assert!(err.concerns("SQL_CONNECTION_MAX_LIFE_TIME"));
        assert!(!err.concerns("SQL_CONNECTION_MAX_IDLE_TIME"));
    }

    #[test]
    fn test_invalid_port() {
        let err = ConfigError::invalid("sql.port", "must be non-zero");
        assert_eq!(err.to_string(), "sql.port must be non-zero");
        assert!(err.concerns("SQL_PORT"));
    }

    #[test]
    fn test_file_errors_have_no_key() {
        let err = ConfigError::file_not_found("trezer.toml");
        assert_eq!(err.to_string(), "configuration file trezer.toml does not exist");
        assert!(err.key().is_none());
        assert!(!ConfigError::UnsupportedFormat("yaml".into()).concerns("yaml"));
    }
}
