//! Core middleware trait.
//!
//! This module defines the [`Middleware`] trait every pipeline participant
//! implements. A middleware takes part in four lifecycle phases:
//!
//! | Hook | When | Order |
//! |------|------|-------|
//! | `on_setup` | first invocation, retried until every middleware succeeds | registration |
//! | `on_before` | every invocation, before the handler | registration |
//! | `on_after` | every invocation, over the surviving working set | reverse |
//! | `on_shutdown` | once, on termination | reverse |
//!
//! All four hooks are required, even when a middleware has nothing to do in
//! a phase.
//!
//! # Example
//!
//! ```
//! use trezer_middleware::{BoxFuture, Fault, FaultResult, InvocationContext, Middleware};
//!
//! struct Counter;
//!
//! impl Middleware<String, String> for Counter {
//!     fn name(&self) -> &'static str {
//!         "counter"
//!     }
//!
//!     fn on_setup<'a>(
//!         &'a self,
//!         _ctx: &'a InvocationContext,
//!         _first_request: &'a String,
//!     ) -> BoxFuture<'a, FaultResult<()>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn on_before<'a>(
//!         &'a self,
//!         _ctx: &'a InvocationContext,
//!         _request: &'a String,
//!     ) -> BoxFuture<'a, FaultResult<()>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn on_after<'a>(
//!         &'a self,
//!         _response: &'a mut String,
//!         fault: Option<Fault>,
//!     ) -> BoxFuture<'a, Option<Fault>> {
//!         Box::pin(async move { fault })
//!     }
//!
//!     fn on_shutdown(&self) -> BoxFuture<'_, ()> {
//!         Box::pin(async {})
//!     }
//! }
//! ```

use std::sync::Arc;
use trezer_core::{BoxFuture, Fault, FaultResult, InvocationContext};

/// A type-erased middleware that can be stored in the pipeline.
pub type BoxedMiddleware<Req, Res> = Arc<dyn Middleware<Req, Res>>;

/// A lifecycle participant of the [`Pipeline`](crate::Pipeline).
///
/// Hooks take `&self`: a middleware that keeps state between phases (an open
/// transaction, a captured request id) uses interior mutability.
///
/// # Invariants
///
/// - `on_setup` runs before any `on_before` on the same instance
/// - `on_after` runs only if this middleware's Setup and Before succeeded
///   for the current invocation
/// - `on_after` MUST return the incoming fault unless it deliberately
///   replaces, transforms or clears it
pub trait Middleware<Req, Res>: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and by test harnesses.
    fn name(&self) -> &'static str;

    /// Called on the first invocation, and again on later invocations until
    /// the Setup phase completes for every middleware.
    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>>;

    /// Called before every invocation of the handler.
    fn on_before<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>>;

    /// Called after the handler, or after a failed forward phase.
    ///
    /// Receives the current response and fault and returns the fault handed
    /// to the previously registered middleware.
    fn on_after<'a>(
        &'a self,
        response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>>;

    /// Called once when the process receives a termination signal.
    fn on_shutdown(&self) -> BoxFuture<'_, ()>;
}
