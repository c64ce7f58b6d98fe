//! Per-invocation context types.
//!
//! An [`InvocationContext`] is built by the host for every request and handed
//! to the Setup and Before hooks and to the handler. It carries the host's
//! request metadata and the pipeline's [`LogContext`].

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::Span;
use uuid::Uuid;

/// Shared, replaceable logging context.
///
/// The pipeline owns one `LogContext` for the lifetime of the process. The
/// logging middleware installs the invocation span into it during Setup;
/// middlewares registered after it derive their own spans from it.
#[derive(Debug, Clone)]
pub struct LogContext {
    span: Arc<RwLock<Span>>,
}

impl LogContext {
    /// Creates a context holding a disabled span.
    #[must_use]
    pub fn new() -> Self {
        Self {
            span: Arc::new(RwLock::new(Span::none())),
        }
    }

    /// Returns the current span.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span.read().clone()
    }

    /// Replaces the current span for every holder of this context.
    pub fn replace(&self, span: Span) {
        *self.span.write() = span;
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Host metadata for one invocation.
///
/// # Example
///
/// ```
/// use trezer_core::InvocationContext;
///
/// let ctx = InvocationContext::new("c6af9ac6-7b61-11e6-9a41-93e8deadbeef")
///     .with_function_arn("arn:aws:lambda:eu-west-3:123456789012:function:pet-get");
/// assert_eq!(ctx.request_id(), "c6af9ac6-7b61-11e6-9a41-93e8deadbeef");
/// ```
#[derive(Debug, Clone)]
pub struct InvocationContext {
    request_id: String,
    deadline: Option<SystemTime>,
    function_arn: Option<String>,
    trace_id: Option<String>,
    log: LogContext,
}

impl InvocationContext {
    /// Creates a context for the given host request id.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            function_arn: None,
            trace_id: None,
            log: LogContext::new(),
        }
    }

    /// Creates a context with a fresh UUID v7 request id.
    ///
    /// Used when driving the pipeline without a host.
    #[must_use]
    pub fn local() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    /// Sets the invocation deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the invoked function ARN.
    #[must_use]
    pub fn with_function_arn(mut self, arn: impl Into<String>) -> Self {
        self.function_arn = Some(arn.into());
        self
    }

    /// Sets the tracing header propagated by the host.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Attaches the pipeline's logging context.
    pub fn attach_log_context(&mut self, log: LogContext) {
        self.log = log;
    }

    /// The host request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The invocation deadline, if the host provided one.
    #[must_use]
    pub const fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    /// Time left before the deadline. `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline?;
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// The invoked function ARN.
    #[must_use]
    pub fn function_arn(&self) -> Option<&str> {
        self.function_arn.as_deref()
    }

    /// The propagated tracing header.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// The pipeline's logging context.
    #[must_use]
    pub const fn log_context(&self) -> &LogContext {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_context_has_v7_id() {
        let ctx = InvocationContext::local();
        let id = Uuid::parse_str(ctx.request_id()).unwrap();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_remaining_time() {
        let ctx = InvocationContext::new("id");
        assert!(ctx.remaining().is_none());

        let past = SystemTime::now() - Duration::from_secs(5);
        let ctx = InvocationContext::new("id").with_deadline(past);
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));

        let future = SystemTime::now() + Duration::from_secs(60);
        let ctx = InvocationContext::new("id").with_deadline(future);
        assert!(ctx.remaining().unwrap() > Duration::from_secs(30));
    }

    #[test]
    fn test_log_context_is_shared() {
        let log = LogContext::new();
        let mut ctx = InvocationContext::new("id");
        ctx.attach_log_context(log.clone());

        log.replace(tracing::info_span!("invocation"));
        // Spans are disabled without a subscriber; sharing is what matters.
        assert_eq!(ctx.log_context().span().id(), log.span().id());
    }
}
