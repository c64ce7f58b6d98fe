//! # Trezer
//!
//! **Middleware lifecycle framework for serverless functions**
//!
//! A function is an ordered list of middlewares wrapped around one handler.
//! Trezer drives every invocation through a fixed lifecycle and reports
//! failures as layered faults:
//!
//! - **Lifecycle** – Setup once, Before and After per invocation, Shutdown on
//!   termination
//! - **Faults** – every error carries a code, a layer, metadata and its cause
//!   chain
//! - **Transactions** – one SQL transaction per invocation, committed or
//!   rolled back by the outcome
//! - **HTTP** – API Gateway proxy responses with fault-to-status mapping
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trezer::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RuntimeError> {
//!     let config = trezer::runtime::load_config()?;
//!     trezer::runtime::init_logging(&config)?;
//!
//!     let pipeline = Pipeline::builder()
//!         .use_middleware(LoggingMiddleware::new(trezer::runtime::log_config(&config)))
//!         .use_middleware(ApiGatewayMiddleware::new())
//!         .use_middleware(SqlMiddleware::new(PgConnector::with_config_or_env(config.sql)))
//!         .build(handler_fn(|_ctx: InvocationContext, _req: ApiGatewayProxyRequest| async move {
//!             Ok(api_gateway::ok_empty())
//!         }));
//!
//!     trezer::runtime::start(pipeline).await
//! }
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Setup (once) → Before → Handler
//!                            ↓
//!         host ← After (reverse order)
//!
//! SIGTERM → Shutdown (reverse order)
//! ```

#![doc(html_root_url = "https://docs.rs/trezer/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trezer_core as core;

// Re-export pipeline and bundled middlewares
pub use trezer_middleware as middleware;

// Re-export SQL transaction middleware
pub use trezer_sql as sql;

// Re-export Lambda host binding
pub use trezer_runtime as runtime;

// Re-export configuration
pub use trezer_config as config;

// Re-export logging setup
pub use trezer_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use trezer::prelude::*;
/// ```
pub mod prelude {
    pub use trezer_core::{
        handler_fn, outcome_fn, Fault, FaultKind, FaultResult, Handler, HandlerOutcome,
        InvocationContext, Layer, Metadata, Validate, ValidationErrors,
    };

    // Pipeline and middlewares
    pub use trezer_middleware::events::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
    pub use trezer_middleware::stages::{
        api_gateway, ApiGatewayMiddleware, LoggingMiddleware, ValidatorMiddleware,
    };
    pub use trezer_middleware::{InvocationOutcome, Middleware, Pipeline};

    // SQL
    pub use trezer_sql::{PgConnector, SqlMiddleware, SqlQuery};

    // Runtime
    pub use trezer_config::TrezerConfig;
    pub use trezer_runtime::RuntimeError;
}
