//! Lambda host binding.

use lambda_runtime::{service_fn, LambdaEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use trezer_core::InvocationContext;
use trezer_middleware::Pipeline;

use crate::{RuntimeError, ShutdownSignal};

/// Builds the invocation context from the host's request context.
pub fn invocation_context(context: &lambda_runtime::Context) -> InvocationContext {
    let ctx = InvocationContext::new(context.request_id.clone())
        .with_deadline(UNIX_EPOCH + Duration::from_millis(context.deadline))
        .with_function_arn(context.invoked_function_arn.clone());
    match &context.xray_trace_id {
        Some(trace_id) => ctx.with_trace_id(trace_id.clone()),
        None => ctx,
    }
}

/// Runs one event through the pipeline.
///
/// A fault that survives the After phase is returned to the host as a
/// function error.
pub async fn invoke<Req, Res>(
    pipeline: &Pipeline<Req, Res>,
    event: LambdaEvent<Req>,
) -> Result<Res, lambda_runtime::Error>
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    let ctx = invocation_context(&event.context);
    pipeline
        .handle(ctx, event.payload)
        .await
        .into_result()
        .map_err(lambda_runtime::Error::from)
}

/// Serves invocations until the host loop ends or a termination signal
/// arrives.
///
/// This is the function entry point:
///
/// ```no_run
/// use trezer_middleware::events::ApiGatewayProxyRequest;
/// use trezer_middleware::stages::{api_gateway, ApiGatewayMiddleware};
/// use trezer_middleware::{handler_fn, InvocationContext, Pipeline};
///
/// #[tokio::main]
/// async fn main() -> Result<(), trezer_runtime::RuntimeError> {
///     let pipeline = Pipeline::builder()
///         .use_middleware(ApiGatewayMiddleware::new())
///         .build(handler_fn(|_ctx: InvocationContext, _req: ApiGatewayProxyRequest| async move {
///             Ok(api_gateway::ok_empty())
///         }));
///     trezer_runtime::start(pipeline).await
/// }
/// ```
///
/// # Errors
///
/// [`RuntimeError::Signal`] if signal handlers cannot be registered,
/// [`RuntimeError::Host`] if the host loop fails.
pub async fn start<Req, Res>(pipeline: Pipeline<Req, Res>) -> Result<(), RuntimeError>
where
    Req: DeserializeOwned + Send + Sync + 'static,
    Res: Serialize + Default + Send + 'static,
{
    let signal = ShutdownSignal::with_os_signals()?;
    serve(pipeline, signal).await
}

/// Like [`start`], with an explicit shutdown signal.
///
/// On the signal the pipeline waits for the in-flight invocation, then runs
/// every Shutdown hook once. The pipeline is also shut down when the host
/// loop ends on its own.
///
/// # Errors
///
/// [`RuntimeError::Host`] if the host loop fails.
pub async fn serve<Req, Res>(
    pipeline: Pipeline<Req, Res>,
    signal: ShutdownSignal,
) -> Result<(), RuntimeError>
where
    Req: DeserializeOwned + Send + Sync + 'static,
    Res: Serialize + Default + Send + 'static,
{
    let pipeline = Arc::new(pipeline);
    tracing::info!(
        middlewares = ?pipeline.middleware_names(),
        "Starting function"
    );

    let mut drained = tokio::spawn(shutdown_on(Arc::clone(&pipeline), signal));

    let host = Arc::clone(&pipeline);
    let service = service_fn(move |event: LambdaEvent<Req>| {
        let pipeline = Arc::clone(&host);
        async move { invoke(&pipeline, event).await }
    });

    tokio::select! {
        result = lambda_runtime::run(service) => {
            pipeline.shutdown().await;
            result.map_err(RuntimeError::host)
        }
        _ = &mut drained => Ok(()),
    }
}

/// Waits for `signal`, then shuts the pipeline down.
pub async fn shutdown_on<Req, Res>(pipeline: Arc<Pipeline<Req, Res>>, signal: ShutdownSignal)
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    signal.recv().await;
    pipeline.shutdown().await;
}
