//! Handler trait for request processing.
//!
//! The [`Handler`] is the domain function the pipeline calls once every
//! Before hook has succeeded. It receives the [`InvocationContext`] and the
//! request, and produces a [`HandlerOutcome`]: a response, possibly paired
//! with a [`Fault`]. The After phase sees that response either way.

use crate::context::InvocationContext;
use crate::fault::Fault;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produced.
#[derive(Debug)]
pub struct HandlerOutcome<Res> {
    /// The response, handed to every After hook.
    pub response: Res,
    /// The fault raised by the handler, if any.
    pub fault: Option<Fault>,
}

impl<Res> HandlerOutcome<Res> {
    /// A successful outcome.
    pub const fn ok(response: Res) -> Self {
        Self {
            response,
            fault: None,
        }
    }

    /// A failed outcome that still carries a response.
    pub const fn failed(response: Res, fault: Fault) -> Self {
        Self {
            response,
            fault: Some(fault),
        }
    }
}

impl<Res: Default> From<Result<Res, Fault>> for HandlerOutcome<Res> {
    fn from(result: Result<Res, Fault>) -> Self {
        match result {
            Ok(response) => Self::ok(response),
            Err(fault) => Self::failed(Res::default(), fault),
        }
    }
}

/// A domain request handler.
///
/// Object-safe so the pipeline can hold it behind an `Arc<dyn Handler>`.
/// Async functions and closures implement it through [`handler_fn`] (which
/// answers a fault with `Res::default()`) or [`outcome_fn`] (which keeps the
/// response built alongside the fault).
///
/// # Example
///
/// ```
/// use trezer_core::{handler_fn, Fault, Handler, InvocationContext};
///
/// let handler = handler_fn(|_ctx: InvocationContext, name: String| async move {
///     Ok::<_, Fault>(format!("hello {name}"))
/// });
///
/// # tokio_test::block_on(async {
/// let outcome = handler.handle(InvocationContext::local(), "rex".to_string()).await;
/// assert_eq!(outcome.response, "hello rex");
/// assert!(outcome.fault.is_none());
/// # });
/// ```
pub trait Handler<Req, Res>: Send + Sync + 'static {
    /// Handles one request.
    fn handle(&self, ctx: InvocationContext, request: Req) -> BoxFuture<'_, HandlerOutcome<Res>>;
}

/// Wraps a closure returning `Result<Res, Fault>`.
#[derive(Debug, Clone, Copy)]
pub struct FnHandler<F> {
    func: F,
}

/// Wraps an async function or closure as a [`Handler`].
///
/// A returned fault is paired with `Res::default()`.
pub const fn handler_fn<F>(func: F) -> FnHandler<F> {
    FnHandler { func }
}

impl<F, Fut, Req, Res> Handler<Req, Res> for FnHandler<F>
where
    F: Fn(InvocationContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, Fault>> + Send + 'static,
    Res: Default + Send + 'static,
{
    fn handle(&self, ctx: InvocationContext, request: Req) -> BoxFuture<'_, HandlerOutcome<Res>> {
        let pending = (self.func)(ctx, request);
        Box::pin(async move { HandlerOutcome::from(pending.await) })
    }
}

/// Wraps a closure returning a full [`HandlerOutcome`].
#[derive(Debug, Clone, Copy)]
pub struct OutcomeFn<F> {
    func: F,
}

/// Wraps an async function or closure that returns a response and a fault
/// together.
///
/// ```
/// use trezer_core::{outcome_fn, Fault, Handler, HandlerOutcome, InvocationContext};
///
/// let handler = outcome_fn(|_ctx: InvocationContext, _req: u8| async move {
///     let fault = Fault::use_case("Test", "PARTIAL", "partial").build();
///     HandlerOutcome::failed(vec!["written"], fault)
/// });
///
/// # tokio_test::block_on(async {
/// let outcome = handler.handle(InvocationContext::local(), 1).await;
/// assert_eq!(outcome.response, vec!["written"]);
/// assert_eq!(outcome.fault.map(|f| f.code().to_string()).as_deref(), Some("PARTIAL"));
/// # });
/// ```
pub const fn outcome_fn<F>(func: F) -> OutcomeFn<F> {
    OutcomeFn { func }
}

impl<F, Fut, Req, Res> Handler<Req, Res> for OutcomeFn<F>
where
    F: Fn(InvocationContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome<Res>> + Send + 'static,
{
    fn handle(&self, ctx: InvocationContext, request: Req) -> BoxFuture<'_, HandlerOutcome<Res>> {
        Box::pin((self.func)(ctx, request))
    }
}
