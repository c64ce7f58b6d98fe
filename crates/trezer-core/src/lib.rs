//! # Trezer Core
//!
//! Core types shared by every Trezer crate:
//!
//! - [`Fault`] - Structured error carrying a code, layer, component, metadata and cause
//! - [`FaultKind`] / [`Layer`] - Classification of where a fault originated
//! - [`DecodeFailure`] - Best-effort taxonomy of JSON decoding failures
//! - [`ValidationErrors`] / [`Validate`] - Field-level validation results
//! - [`InvocationContext`] / [`LogContext`] - Per-invocation state handed to hooks
//! - [`Handler`] / [`HandlerOutcome`] - The domain request handler and what it produced

#![doc(html_root_url = "https://docs.rs/trezer-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod decode;
mod fault;
mod handler;
pub mod status;
mod validation;

pub use context::{InvocationContext, LogContext};
pub use decode::DecodeFailure;
pub use fault::{format_elapsed, Fault, FaultBuilder, FaultKind, FaultResult, Layer, Metadata};
pub use handler::{
    handler_fn, outcome_fn, BoxFuture, FnHandler, Handler, HandlerOutcome, OutcomeFn,
};
pub use validation::{Validate, ValidationEntry, ValidationErrors};
