//! # Trezer Middleware
//!
//! Lifecycle pipeline for serverless functions.
//!
//! A function is an ordered list of middlewares around one handler. Each
//! invocation flows through the lifecycle:
//!
//! ```text
//! Setup (once) → Before → Handler
//!                            ↓
//!         host ← After (reverse order)
//!
//! termination → Shutdown (reverse order)
//! ```
//!
//! | Phase | Runs | Order | On fault |
//! |-------|------|-------|----------|
//! | Setup | until every middleware succeeded once | registration | skip to After, retried next invocation |
//! | Before | every invocation | registration | skip to After |
//! | Handler | when Before succeeded | - | passed to After |
//! | After | every invocation | reverse | each hook may keep, replace or clear the fault |
//! | Shutdown | once | reverse | - |
//!
//! After only runs for the middlewares that completed the failed forward
//! phase, so a middleware never cleans up state it did not create.
//!
//! ## Example
//!
//! ```
//! use trezer_middleware::events::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
//! use trezer_middleware::stages::{api_gateway, ApiGatewayMiddleware};
//! use trezer_middleware::{handler_fn, InvocationContext, Pipeline};
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder()
//!     .use_middleware(ApiGatewayMiddleware::new())
//!     .build(handler_fn(|_ctx: InvocationContext, _req: ApiGatewayProxyRequest| async move {
//!         api_gateway::ok(&serde_json::json!({ "status": "up" }))
//!     }));
//!
//! let request = ApiGatewayProxyRequest::new("GET", "/health").with_request_id("abc", "now");
//! let outcome = pipeline.handle(InvocationContext::local(), request).await;
//!
//! let response: ApiGatewayProxyResponse = outcome.response;
//! assert_eq!(response.status_code, 200);
//! assert_eq!(response.headers["requestId"], "abc");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trezer-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod events;
pub mod middleware;
pub mod pipeline;
pub mod stages;

// Re-export main types at crate root
pub use middleware::{BoxedMiddleware, Middleware};
pub use pipeline::{InvocationOutcome, Pipeline, PipelineBuilder};
pub use trezer_core::{
    handler_fn, outcome_fn, BoxFuture, Fault, FaultResult, Handler, HandlerOutcome,
    InvocationContext, LogContext,
};
