//! Logging middleware.
//!
//! Registered first. Its Setup installs the global subscriber and derives
//! the invocation span from the first request; every middleware registered
//! after it, and the pipeline itself, log under that span.

use crate::events::{ApiGatewayProxyRequest, SqsEvent};
use crate::middleware::Middleware;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::Span;
use trezer_core::{BoxFuture, Fault, FaultResult, InvocationContext};
use trezer_telemetry::{try_init_logging, LogConfig};

const COMPONENT: &str = "Logger";

/// Request types that can describe themselves in the invocation span.
pub trait LogFields: Debug {
    /// Builds the span every record of the invocation is attached to.
    fn invocation_span(&self) -> Span;
}

impl LogFields for ApiGatewayProxyRequest {
    fn invocation_span(&self) -> Span {
        tracing::info_span!(
            "invocation",
            event_type = "APIGatewayProxyRequest",
            method = %self.http_method,
            path = %self.path,
            request = %self.request_context.request_id,
        )
    }
}

impl LogFields for SqsEvent {
    fn invocation_span(&self) -> Span {
        tracing::info_span!("invocation", event_type = "SQSEvent", count = self.records.len())
    }
}

impl LogFields for serde_json::Value {
    fn invocation_span(&self) -> Span {
        tracing::info_span!("invocation", event_type = "unknown")
    }
}

/// Installs logging and the invocation span.
pub struct LoggingMiddleware<Req, Res> {
    config: LogConfig,
    span: RwLock<Span>,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> LoggingMiddleware<Req, Res> {
    /// Creates the middleware with an explicit logging configuration.
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            span: RwLock::new(Span::none()),
            _marker: PhantomData,
        }
    }

    /// The logging configuration in use.
    #[must_use]
    pub const fn config(&self) -> &LogConfig {
        &self.config
    }

    fn span(&self) -> Span {
        self.span.read().clone()
    }
}

impl<Req, Res> Middleware<Req, Res> for LoggingMiddleware<Req, Res>
where
    Req: LogFields + Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        "logger"
    }

    fn on_setup<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            let installed = try_init_logging(&self.config).map_err(|err| {
                Fault::framework(COMPONENT, "LOGGER_SETUP_ERROR", "Cannot set up the logger")
                    .cause(err)
                    .build()
            })?;

            let invocation = first_request.invocation_span();
            ctx.log_context().replace(invocation.clone());
            *self.span.write() =
                tracing::info_span!(parent: &invocation, "logger", framework = "LOGGER");

            tracing::debug!(
                parent: &self.span(),
                installed,
                json = self.config.json_format,
                level = %self.config.level,
                "Logger created"
            );
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), request = ?request, "Received request");
            Ok(())
        })
    }

    fn on_after<'a>(
        &'a self,
        _response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move { fault })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tracing::trace!(parent: &self.span(), "Logger shut down");
        })
    }
}

impl<Req, Res> Debug for LoggingMiddleware<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingMiddleware")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
