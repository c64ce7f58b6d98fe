//! # Trezer Runtime
//!
//! Binds a [`Pipeline`](trezer_middleware::Pipeline) to the Lambda host.
//!
//! A function binary loads its configuration, initializes logging, builds
//! its pipeline and hands it to [`start`]:
//!
//! ```no_run
//! use trezer_middleware::events::ApiGatewayProxyRequest;
//! use trezer_middleware::stages::{api_gateway, ApiGatewayMiddleware, LoggingMiddleware};
//! use trezer_middleware::{handler_fn, InvocationContext, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trezer_runtime::RuntimeError> {
//!     let config = trezer_runtime::load_config()?;
//!     trezer_runtime::init_logging(&config)?;
//!
//!     let pipeline = Pipeline::builder()
//!         .use_middleware(LoggingMiddleware::new(trezer_runtime::log_config(&config)))
//!         .use_middleware(ApiGatewayMiddleware::new())
//!         .build(handler_fn(|_ctx: InvocationContext, _req: ApiGatewayProxyRequest| async move {
//!             Ok(api_gateway::ok_empty())
//!         }));
//!     trezer_runtime::start(pipeline).await
//! }
//! ```
//!
//! Invocations run one at a time. On SIGTERM the in-flight invocation
//! finishes, then every Shutdown hook runs once in reverse order.

#![doc(html_root_url = "https://docs.rs/trezer-runtime/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod error;
mod host;
mod shutdown;

pub use bootstrap::{init_logging, load_config, log_config, CONFIG_FILE, ENV_PREFIX};
pub use error::RuntimeError;
pub use host::{invocation_context, invoke, serve, shutdown_on, start};
pub use shutdown::ShutdownSignal;
