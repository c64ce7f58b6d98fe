//! Runtime error types.

use thiserror::Error;
use trezer_config::ConfigError;
use trezer_telemetry::TelemetryError;

/// Errors that stop a function before or outside an invocation.
///
/// Faults raised while handling an invocation are reported to the host and
/// never end the process.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The host invocation loop failed.
    #[error("lambda runtime error: {0}")]
    Host(String),

    /// A termination signal handler could not be registered.
    #[error("cannot register signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// Logging could not be initialized.
    #[error(transparent)]
    Logging(#[from] TelemetryError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Wraps a host loop error.
    pub fn host(err: impl std::fmt::Display) -> Self {
        Self::Host(err.to_string())
    }
}
