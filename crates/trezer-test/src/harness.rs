//! Invocation harness.
//!
//! Drives a [`Pipeline`] the way the host does, one invocation at a time,
//! with a fresh [`InvocationContext`] per call.

use trezer_core::{Fault, InvocationContext};
use trezer_middleware::{InvocationOutcome, Pipeline};

/// Test driver around a pipeline.
#[derive(Debug)]
pub struct TestInvoker<Req, Res> {
    pipeline: Pipeline<Req, Res>,
    next_id: u64,
}

impl<Req, Res> TestInvoker<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Default + Send + 'static,
{
    /// Wraps a built pipeline.
    #[must_use]
    pub fn new(pipeline: Pipeline<Req, Res>) -> Self {
        Self {
            pipeline,
            next_id: 0,
        }
    }

    /// Runs one invocation with request id `test-<n>`.
    pub async fn invoke(&mut self, request: Req) -> InvocationOutcome<Res> {
        self.next_id += 1;
        let ctx = InvocationContext::new(format!("test-{}", self.next_id));
        self.pipeline.handle(ctx, request).await
    }

    /// Runs one invocation and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the invocation ends with a fault.
    pub async fn invoke_ok(&mut self, request: Req) -> Res {
        match self.invoke(request).await.into_result() {
            Ok(response) => response,
            Err(fault) => panic!("expected success, got {fault}"),
        }
    }

    /// Runs one invocation and returns the final fault.
    ///
    /// # Panics
    ///
    /// Panics if the invocation succeeds.
    pub async fn invoke_err(&mut self, request: Req) -> Fault {
        match self.invoke(request).await.fault {
            Some(fault) => fault,
            None => panic!("expected a fault, the invocation succeeded"),
        }
    }

    /// Runs the Shutdown phase.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    /// The wrapped pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline<Req, Res> {
        &self.pipeline
    }
}
