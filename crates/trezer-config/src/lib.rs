//! Typed configuration for Trezer functions.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Flat deployment variables (`ENVIRONMENT`, `LOG_LEVEL`, `SQL_*`)
//! - Prefixed environment overrides (`TREZER__SQL__HOST`)
//! - Strict validation (fails on unknown fields)
//! - Duration strings such as `"30s"` or `"1m30s"`
//!
//! # Configuration File Format
//!
//! ```toml
//! environment = "DEV"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [sql]
//! user = "pets"
//! password = "secret"
//! host = "localhost"
//! port = 5432
//! database = "pets"
//! connection_max_idle_time = "30s"
//! connection_max_life_time = "5m"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use trezer_config::ConfigLoader;
//!
//! # fn main() -> Result<(), trezer_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_lambda_env()?
//!     .load()?;
//!
//! println!("connecting to {}", config.sql.host);
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/trezer-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub mod duration;
mod error;
mod loader;
mod schema;

pub use config::{TrezerConfig, LOCAL_ENVIRONMENT};
pub use duration::{format_duration, parse_duration, DurationError};
pub use error::ConfigError;
pub use loader::{vars, ConfigLoader};
pub use schema::{LogFormat, LoggingConfig, SqlConfig};
