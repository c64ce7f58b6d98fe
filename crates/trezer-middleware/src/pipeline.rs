//! The lifecycle pipeline.
//!
//! A [`Pipeline`] owns an ordered, append-only list of middlewares and the
//! domain handler, and drives every invocation through the lifecycle:
//!
//! ```text
//! Setup (until it succeeds once) → Before → Handler → After (reverse) → host
//! ```
//!
//! A failure in a forward phase at index `k` short-circuits the remaining
//! forward phases. The After phase still runs, in reverse, over the working
//! set `[0, k)`: the middlewares that completed the failed phase. The handler
//! never runs in that case and After receives `Res::default()`. A handler
//! fault keeps whatever response the handler built alongside it.
//!
//! Setup is not terminal on failure. The next invocation retries it from
//! index 0 until every middleware succeeds once.
//!
//! # Example
//!
//! ```
//! use trezer_middleware::{handler_fn, InvocationContext, Pipeline};
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::<String, String>::builder()
//!     .build(handler_fn(|_ctx: InvocationContext, req: String| async move {
//!         Ok(req.to_uppercase())
//!     }));
//!
//! let outcome = pipeline.handle(InvocationContext::local(), "rex".to_string()).await;
//! assert_eq!(outcome.response, "REX");
//! assert!(outcome.fault.is_none());
//! # });
//! ```

use crate::middleware::{BoxedMiddleware, Middleware};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{Instrument, Span};
use trezer_core::{format_elapsed, Fault, Handler, InvocationContext, LogContext};

/// Component name used for faults raised by the pipeline itself.
const COMPONENT: &str = "Pipeline";

/// Final state of one invocation, returned to the host.
#[derive(Debug)]
pub struct InvocationOutcome<Res> {
    /// The response after every After hook ran.
    pub response: Res,
    /// The fault after every After hook ran.
    pub fault: Option<Fault>,
}

impl<Res> InvocationOutcome<Res> {
    /// Converts into a `Result`, dropping the response when a fault remains.
    pub fn into_result(self) -> Result<Res, Fault> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.response),
        }
    }
}

/// The lifecycle orchestrator.
///
/// One pipeline is built at process start and lives for the whole process.
/// Invocations are serialised: a second call to [`handle`](Self::handle)
/// waits for the first to finish, and [`shutdown`](Self::shutdown) waits for
/// the in-flight invocation to drain.
pub struct Pipeline<Req, Res> {
    middlewares: Vec<BoxedMiddleware<Req, Res>>,
    handler: Arc<dyn Handler<Req, Res>>,
    started: AtomicBool,
    shut_down: AtomicBool,
    log: LogContext,
    span: RwLock<Span>,
    started_at: Instant,
    gate: Mutex<()>,
    invocations: AtomicU64,
    setup_attempts: AtomicU64,
}

impl<Req, Res> Pipeline<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder<Req, Res> {
        PipelineBuilder::new()
    }

    /// Runs one invocation through the full lifecycle.
    pub async fn handle(&self, mut ctx: InvocationContext, request: Req) -> InvocationOutcome<Res> {
        let _gate = self.gate.lock().await;
        ctx.attach_log_context(self.log.clone());
        self.invocations.fetch_add(1, Ordering::Relaxed);

        if self.shut_down.load(Ordering::Acquire) {
            let fault = Fault::framework(
                COMPONENT,
                "PIPELINE_SHUT_DOWN",
                "The pipeline has been shut down",
            )
            .build();
            return InvocationOutcome {
                response: Res::default(),
                fault: Some(fault),
            };
        }

        let (working, fault) = match self.run_setup(&ctx, &request).await {
            Ok(()) => self.run_before(&ctx, &request).await,
            Err(failed) => failed,
        };

        let (mut response, fault) = match fault {
            Some(fault) => (Res::default(), Some(fault)),
            None => {
                tracing::trace!(parent: &self.span(), "Entering handler...");
                let outcome = self
                    .handler
                    .handle(ctx, request)
                    .instrument(self.span())
                    .await;
                tracing::trace!(
                    parent: &self.span(),
                    failed = outcome.fault.is_some(),
                    "Exited handler"
                );
                (outcome.response, outcome.fault)
            }
        };

        let fault = self.run_after(&mut response, fault, working).await;
        tracing::trace!(
            parent: &self.span(),
            final_fault = fault.as_ref().map(Fault::code),
            "Returning from handle"
        );
        InvocationOutcome { response, fault }
    }

    /// Runs every Shutdown hook in reverse registration order, then logs uptime.
    ///
    /// Waits for an in-flight invocation to complete first. Only the first
    /// call has an effect; invocations after shutdown fail with
    /// `PIPELINE_SHUT_DOWN`.
    pub async fn shutdown(&self) {
        let _gate = self.gate.lock().await;
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let span = self.span();
        tracing::debug!(parent: &span, "Received SIGTERM, starting shutdown hooks... (1/2)");
        for middleware in self.middlewares.iter().rev() {
            middleware.on_shutdown().instrument(span.clone()).await;
        }
        tracing::debug!(parent: &span, "Received SIGTERM, all shutdown hooks triggered (2/2)");

        let uptime = self.uptime();
        tracing::info!(
            parent: &span,
            uptime = u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            "Uptime: {}",
            format_elapsed(uptime)
        );
    }

    // Setup phase. `Err` carries the working set length and the failing fault.
    async fn run_setup(
        &self,
        ctx: &InvocationContext,
        request: &Req,
    ) -> Result<(), (usize, Option<Fault>)> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }

        self.setup_attempts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(parent: &self.span(), "OnSetup");

        let total = self.middlewares.len();
        for (index, middleware) in self.middlewares.iter().enumerate() {
            let result = middleware
                .on_setup(ctx, request)
                .instrument(self.span())
                .await;

            if index == 0 && result.is_ok() {
                self.rederive_span();
            }

            if let Err(fault) = result {
                tracing::error!(
                    parent: &self.span(),
                    middleware = middleware.name(),
                    error = %fault,
                    "OnSetup encountered an error ({}/{} middlewares added)",
                    index + 1,
                    total
                );
                return Err((index, Some(fault)));
            }
        }

        self.started.store(true, Ordering::Release);
        tracing::info!(parent: &self.span(), "{} middleware(s) added", total);
        Ok(())
    }

    // Before phase. Returns the working set length and the failing fault.
    async fn run_before(&self, ctx: &InvocationContext, request: &Req) -> (usize, Option<Fault>) {
        tracing::debug!(parent: &self.span(), "OnBefore");

        let total = self.middlewares.len();
        for (index, middleware) in self.middlewares.iter().enumerate() {
            if let Err(fault) = middleware
                .on_before(ctx, request)
                .instrument(self.span())
                .await
            {
                tracing::error!(
                    parent: &self.span(),
                    middleware = middleware.name(),
                    error = %fault,
                    "OnBefore encountered an error ({}/{} middlewares triggered)",
                    index + 1,
                    total
                );
                return (index, Some(fault));
            }
        }
        (total, None)
    }

    async fn run_after(
        &self,
        response: &mut Res,
        mut fault: Option<Fault>,
        working: usize,
    ) -> Option<Fault> {
        tracing::debug!(parent: &self.span(), "OnAfter");
        for middleware in self.middlewares[..working].iter().rev() {
            fault = middleware
                .on_after(response, fault)
                .instrument(self.span())
                .await;
        }
        fault
    }

    // The first middleware installs the invocation span; derive ours from it.
    fn rederive_span(&self) {
        let parent = self.log.span();
        *self.span.write() = tracing::info_span!(parent: &parent, "pipeline", framework = "LAMBDA");
    }

    fn span(&self) -> Span {
        self.span.read().clone()
    }

    /// Names of the registered middlewares, in registration order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|mw| mw.name()).collect()
    }

    /// Number of registered middlewares.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns true once Setup has completed for every middleware.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of invocations handled so far.
    #[must_use]
    pub fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Number of times the Setup phase was attempted.
    #[must_use]
    pub fn setup_attempts(&self) -> u64 {
        self.setup_attempts.load(Ordering::Relaxed)
    }

    /// Time elapsed since the pipeline was built.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// The logging context shared with middlewares.
    #[must_use]
    pub const fn log_context(&self) -> &LogContext {
        &self.log
    }
}

impl<Req, Res> std::fmt::Debug for Pipeline<Req, Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.middlewares.len())
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Registration order is permanent: Setup and Before follow it, After and
/// Shutdown reverse it.
pub struct PipelineBuilder<Req, Res> {
    middlewares: Vec<BoxedMiddleware<Req, Res>>,
}

impl<Req, Res> PipelineBuilder<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Appends a middleware owned by the pipeline.
    #[must_use]
    pub fn use_middleware<M>(self, middleware: M) -> Self
    where
        M: Middleware<Req, Res>,
    {
        self.use_shared(Arc::new(middleware))
    }

    /// Appends a middleware shared with other components.
    ///
    /// Handlers and adapters keep their own `Arc` to call into it, e.g. to run
    /// queries inside the transaction a SQL middleware opened.
    #[must_use]
    pub fn use_shared<M>(mut self, middleware: Arc<M>) -> Self
    where
        M: Middleware<Req, Res>,
    {
        self.middlewares.push(middleware);
        self
    }

    /// Number of middlewares registered so far.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Binds the handler and records the start time.
    #[must_use]
    pub fn build<H>(self, handler: H) -> Pipeline<Req, Res>
    where
        H: Handler<Req, Res>,
    {
        Pipeline {
            middlewares: self.middlewares,
            handler: Arc::new(handler),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            log: LogContext::new(),
            span: RwLock::new(tracing::info_span!("pipeline", framework = "LAMBDA")),
            started_at: Instant::now(),
            gate: Mutex::new(()),
            invocations: AtomicU64::new(0),
            setup_attempts: AtomicU64::new(0),
        }
    }
}

impl<Req, Res> Default for PipelineBuilder<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;
    use proptest::prelude::*;
    use trezer_core::{handler_fn, outcome_fn, BoxFuture, FaultResult, HandlerOutcome};

    type Log = Arc<SyncMutex<Vec<String>>>;

    #[derive(Default, Clone, Copy)]
    struct Failures {
        setup: bool,
        before: bool,
    }

    struct Probe {
        label: &'static str,
        log: Log,
        seen: Log,
        fail: Arc<SyncMutex<Failures>>,
    }

    impl Probe {
        fn new(label: &'static str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                label,
                log: Arc::clone(log),
                seen: Log::default(),
                fail: Arc::new(SyncMutex::new(Failures::default())),
            })
        }

        fn failing_setup(self: Arc<Self>) -> Arc<Self> {
            self.fail.lock().setup = true;
            self
        }

        fn failing_before(self: Arc<Self>) -> Arc<Self> {
            self.fail.lock().before = true;
            self
        }

        fn record(&self, hook: &str) {
            self.log.lock().push(format!("{}:{hook}", self.label));
        }
    }

    impl Middleware<u32, String> for Probe {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_setup<'a>(
            &'a self,
            _ctx: &'a InvocationContext,
            _first_request: &'a u32,
        ) -> BoxFuture<'a, FaultResult<()>> {
            Box::pin(async move {
                self.record("setup");
                if self.fail.lock().setup {
                    return Err(Fault::framework(self.label, "SETUP_FAILED", "setup failed").build());
                }
                Ok(())
            })
        }

        fn on_before<'a>(
            &'a self,
            _ctx: &'a InvocationContext,
            _request: &'a u32,
        ) -> BoxFuture<'a, FaultResult<()>> {
            Box::pin(async move {
                self.record("before");
                if self.fail.lock().before {
                    return Err(Fault::framework(self.label, "BEFORE_FAILED", "before failed").build());
                }
                Ok(())
            })
        }

        fn on_after<'a>(
            &'a self,
            response: &'a mut String,
            fault: Option<Fault>,
        ) -> BoxFuture<'a, Option<Fault>> {
            Box::pin(async move {
                self.record("after");
                self.seen.lock().push(response.clone());
                fault
            })
        }

        fn on_shutdown(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move { self.record("shutdown") })
        }
    }

    fn echo_pipeline(probes: &[Arc<Probe>], calls: &Arc<AtomicU64>) -> Pipeline<u32, String> {
        let calls = Arc::clone(calls);
        probes
            .iter()
            .fold(Pipeline::builder(), |builder, probe| builder.use_shared(Arc::clone(probe)))
            .build(handler_fn(move |_ctx: InvocationContext, req: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(format!("echo {req}")) }
            }))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }

    #[tokio::test]
    async fn test_success_runs_after_in_reverse() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let probes = [Probe::new("a", &log), Probe::new("b", &log), Probe::new("c", &log)];
        let pipeline = echo_pipeline(&probes, &calls);

        let outcome = pipeline.handle(InvocationContext::local(), 7).await;

        assert_eq!(outcome.response, "echo 7");
        assert!(outcome.fault.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            entries(&log),
            vec![
                "a:setup", "b:setup", "c:setup", "a:before", "b:before", "c:before", "c:after",
                "b:after", "a:after",
            ]
        );
        assert!(pipeline.is_started());
    }

    #[tokio::test]
    async fn test_before_failure_skips_handler() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let probes = [
            Probe::new("a", &log),
            Probe::new("b", &log),
            Probe::new("c", &log).failing_before(),
        ];
        let pipeline = echo_pipeline(&probes, &calls);

        let outcome = pipeline.handle(InvocationContext::local(), 1).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.response, String::new());
        assert_eq!(outcome.fault.unwrap().code(), "BEFORE_FAILED");
        assert_eq!(
            entries(&log)[3..],
            ["a:before", "b:before", "c:before", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_setup_failure_is_retried() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let failing = Probe::new("b", &log).failing_setup();
        let probes = [Probe::new("a", &log), Arc::clone(&failing), Probe::new("c", &log)];
        let pipeline = echo_pipeline(&probes, &calls);

        let first = pipeline.handle(InvocationContext::local(), 1).await;
        assert_eq!(first.fault.unwrap().code(), "SETUP_FAILED");
        assert_eq!(entries(&log), vec!["a:setup", "b:setup", "a:after"]);
        assert!(!pipeline.is_started());

        failing.fail.lock().setup = false;
        log.lock().clear();

        let second = pipeline.handle(InvocationContext::local(), 2).await;
        assert!(second.fault.is_none());
        assert_eq!(second.response, "echo 2");
        assert_eq!(&entries(&log)[..3], ["a:setup", "b:setup", "c:setup"]);
        assert_eq!(pipeline.setup_attempts(), 2);
        assert!(pipeline.is_started());
    }

    #[tokio::test]
    async fn test_setup_runs_once_after_success() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let probes = [Probe::new("a", &log)];
        let pipeline = echo_pipeline(&probes, &calls);

        for req in 0..5 {
            pipeline.handle(InvocationContext::local(), req).await;
        }

        let setups = entries(&log).iter().filter(|e| *e == "a:setup").count();
        assert_eq!(setups, 1);
        assert_eq!(pipeline.setup_attempts(), 1);
        assert_eq!(pipeline.invocation_count(), 5);
    }

    #[tokio::test]
    async fn test_handler_fault_reaches_after() {
        let log = Log::default();
        let probes = [Probe::new("a", &log)];
        let pipeline = probes
            .iter()
            .fold(Pipeline::builder(), |b, p| b.use_shared(Arc::clone(p)))
            .build(handler_fn(|_ctx: InvocationContext, _req: u32| async move {
                Err::<String, _>(Fault::use_case("Test", "NOPE", "handler failed").build())
            }));

        let outcome = pipeline.handle(InvocationContext::local(), 1).await;
        assert_eq!(outcome.fault.unwrap().code(), "NOPE");
        assert!(entries(&log).contains(&"a:after".to_string()));
    }

    #[tokio::test]
    async fn test_handler_response_survives_its_fault() {
        let log = Log::default();
        let outer = Probe::new("outer", &log);
        let inner = Probe::new("inner", &log);
        let pipeline = Pipeline::builder()
            .use_shared(Arc::clone(&outer))
            .use_shared(Arc::clone(&inner))
            .build(outcome_fn(|_ctx: InvocationContext, req: u32| async move {
                let fault = Fault::use_case("Test", "PARTIAL", "handler failed").build();
                HandlerOutcome::failed(format!("header:{req}"), fault)
            }));

        let outcome = pipeline.handle(InvocationContext::local(), 9).await;

        assert_eq!(outcome.fault.unwrap().code(), "PARTIAL");
        assert_eq!(outcome.response, "header:9");
        assert_eq!(entries(&inner.seen), vec!["header:9"]);
        assert_eq!(entries(&outer.seen), vec!["header:9"]);
    }

    #[tokio::test]
    async fn test_before_failure_hands_after_a_default_response() {
        let log = Log::default();
        let outer = Probe::new("outer", &log);
        let pipeline = Pipeline::builder()
            .use_shared(Arc::clone(&outer))
            .use_shared(Probe::new("inner", &log).failing_before())
            .build(outcome_fn(|_ctx: InvocationContext, _req: u32| async move {
                HandlerOutcome::ok("unreachable".to_string())
            }));

        pipeline.handle(InvocationContext::local(), 1).await;
        assert_eq!(entries(&outer.seen), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_shutdown_runs_once_in_reverse() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let probes = [Probe::new("a", &log), Probe::new("b", &log)];
        let pipeline = echo_pipeline(&probes, &calls);

        pipeline.shutdown().await;
        pipeline.shutdown().await;

        assert_eq!(entries(&log), vec!["b:shutdown", "a:shutdown"]);
        assert!(pipeline.is_shut_down());

        let outcome = pipeline.handle(InvocationContext::local(), 1).await;
        assert_eq!(outcome.fault.unwrap().code(), "PIPELINE_SHUT_DOWN");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builder_records_names() {
        let log = Log::default();
        let calls = Arc::new(AtomicU64::new(0));
        let probes = [Probe::new("logger", &log), Probe::new("sql", &log)];
        let pipeline = echo_pipeline(&probes, &calls);

        assert_eq!(pipeline.middleware_names(), vec!["logger", "sql"]);
        assert_eq!(pipeline.middleware_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_before_failure_limits_after(n in 1usize..8, k_seed in 0usize..8) {
            let k = k_seed % n;
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let log = Log::default();
            let calls = Arc::new(AtomicU64::new(0));
            let labels = ["m0", "m1", "m2", "m3", "m4", "m5", "m6", "m7"];
            let probes: Vec<_> = (0..n)
                .map(|i| {
                    let probe = Probe::new(labels[i], &log);
                    if i == k { probe.failing_before() } else { probe }
                })
                .collect();
            let pipeline = echo_pipeline(&probes, &calls);

            runtime.block_on(pipeline.handle(InvocationContext::local(), 0));

            let afters: Vec<String> = entries(&log)
                .into_iter()
                .filter(|e| e.ends_with(":after"))
                .collect();
            let expected: Vec<String> = (0..k).rev().map(|i| format!("{}:after", labels[i])).collect();
            prop_assert_eq!(afters, expected);
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn prop_setup_failure_limits_after(n in 1usize..8, k_seed in 0usize..8) {
            let k = k_seed % n;
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let log = Log::default();
            let calls = Arc::new(AtomicU64::new(0));
            let labels = ["m0", "m1", "m2", "m3", "m4", "m5", "m6", "m7"];
            let probes: Vec<_> = (0..n)
                .map(|i| {
                    let probe = Probe::new(labels[i], &log);
                    if i == k { probe.failing_setup() } else { probe }
                })
                .collect();
            let pipeline = echo_pipeline(&probes, &calls);

            runtime.block_on(pipeline.handle(InvocationContext::local(), 0));
            runtime.block_on(pipeline.handle(InvocationContext::local(), 1));

            let log = entries(&log);
            let m0_setups = log.iter().filter(|e| *e == "m0:setup").count();
            prop_assert_eq!(m0_setups, 2);
            let befores = log.iter().filter(|e| e.ends_with(":before")).count();
            prop_assert_eq!(befores, 0);
            let afters: Vec<&String> = log.iter().filter(|e| e.ends_with(":after")).collect();
            let expected: Vec<String> = (0..k).rev().map(|i| format!("{}:after", labels[i])).collect();
            prop_assert_eq!(afters.len(), 2 * k);
            for (got, want) in afters.iter().zip(expected.iter().chain(expected.iter())) {
                prop_assert_eq!(*got, want);
            }
        }
    }
}
