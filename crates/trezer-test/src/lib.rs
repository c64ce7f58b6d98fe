//! # Trezer Test
//!
//! Test utilities for Trezer functions.
//!
//! - [`RecordingMiddleware`] - counts hook calls, records them in a shared
//!   [`CallLog`] and fails or rewrites faults on demand
//! - [`fixtures`] - API Gateway and SQS events with stable ids
//! - [`TestInvoker`] - drives a pipeline one invocation at a time
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use trezer_middleware::{handler_fn, InvocationContext, Pipeline};
//! use trezer_test::{CallLog, Hook, RecordingMiddleware, TestInvoker};
//!
//! # tokio_test::block_on(async {
//! let log = CallLog::new();
//! let outer = Arc::new(RecordingMiddleware::new("outer", &log));
//! let inner = Arc::new(RecordingMiddleware::new("inner", &log).failing_before());
//!
//! let pipeline = Pipeline::<u8, u8>::builder()
//!     .use_shared(Arc::clone(&outer))
//!     .use_shared(Arc::clone(&inner))
//!     .build(handler_fn(|_ctx: InvocationContext, req: u8| async move { Ok(req) }));
//!
//! let mut invoker = TestInvoker::new(pipeline);
//! let fault = invoker.invoke_err(1).await;
//!
//! assert_eq!(fault.code(), "BEFORE_FAILED");
//! assert_eq!(log.names_for(Hook::After), vec!["outer"]);
//! assert_eq!(inner.calls(Hook::After), 0);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trezer-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
mod harness;
mod recording;

pub use harness::TestInvoker;
pub use recording::{AfterAction, CallLog, Hook, RecordingMiddleware};
