//! Structured logging for Trezer functions.
//!
//! Deployed functions log one JSON object per line so the host's log
//! collector can index fields. Local runs (`ENVIRONMENT=LOCAL`) use a
//! human-readable console format at `debug` level.
//!
//! # Example
//!
//! ```rust,ignore
//! use trezer_telemetry::{init_logging, LogConfig};
//!
//! let config = LogConfig::from_environment("LOCAL");
//! init_logging(&config)?;
//!
//! tracing::info!(request_id = "c6af9ac6", "Processing request");
//! ```

#![doc(html_root_url = "https://docs.rs/trezer-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, try_init_logging, LogConfig, LOCAL_ENVIRONMENT};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
