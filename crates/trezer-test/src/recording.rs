//! Recording middleware.
//!
//! [`RecordingMiddleware`] counts every hook call and appends
//! `"<name>:<hook>"` to a [`CallLog`] shared by every recorder of a
//! pipeline, so a test can assert the exact interleaving of phases.

use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use trezer_core::{BoxFuture, Fault, FaultResult, InvocationContext};
use trezer_middleware::Middleware;

/// A lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// `on_setup`
    Setup,
    /// `on_before`
    Before,
    /// `on_after`
    After,
    /// `on_shutdown`
    Shutdown,
}

impl Hook {
    /// The name used in call log entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Before => "before",
            Self::After => "after",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered log of hook calls shared between recorders.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, name: &str, hook: Hook) {
        self.entries.lock().push(format!("{name}:{hook}"));
    }

    /// Snapshot of every entry.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries for one hook, in call order.
    #[must_use]
    pub fn for_hook(&self, hook: Hook) -> Vec<String> {
        let suffix = format!(":{hook}");
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.ends_with(&suffix))
            .cloned()
            .collect()
    }

    /// Names of the middlewares whose `hook` ran, in call order.
    #[must_use]
    pub fn names_for(&self, hook: Hook) -> Vec<String> {
        self.for_hook(hook)
            .into_iter()
            .filter_map(|entry| entry.split(':').next().map(str::to_string))
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// What a recorder's After hook does with the incoming fault.
#[derive(Debug, Clone, Default)]
pub enum AfterAction {
    /// Forward the incoming fault.
    #[default]
    Forward,
    /// Replace it, or raise this fault when there was none.
    Replace(Fault),
    /// Clear it.
    Clear,
}

/// A middleware that records every hook call.
pub struct RecordingMiddleware<Req, Res> {
    name: &'static str,
    log: CallLog,
    setup_calls: AtomicUsize,
    before_calls: AtomicUsize,
    after_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    setup_failures_left: AtomicUsize,
    fail_before: AtomicBool,
    after: Mutex<AfterAction>,
    seen_faults: Mutex<Vec<Option<String>>>,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> RecordingMiddleware<Req, Res> {
    /// Creates a recorder writing to `log`.
    #[must_use]
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            setup_calls: AtomicUsize::new(0),
            before_calls: AtomicUsize::new(0),
            after_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            setup_failures_left: AtomicUsize::new(0),
            fail_before: AtomicBool::new(false),
            after: Mutex::new(AfterAction::Forward),
            seen_faults: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Fails the next `times` Setup calls.
    #[must_use]
    pub fn failing_setup(self, times: usize) -> Self {
        self.set_setup_failures(times);
        self
    }

    /// Fails every Before call until changed.
    #[must_use]
    pub fn failing_before(self) -> Self {
        self.set_fail_before(true);
        self
    }

    /// Sets the After behaviour.
    #[must_use]
    pub fn with_after(self, action: AfterAction) -> Self {
        self.set_after(action);
        self
    }

    /// Changes how many of the next Setup calls fail.
    pub fn set_setup_failures(&self, times: usize) {
        self.setup_failures_left.store(times, Ordering::SeqCst);
    }

    /// Toggles Before failures.
    pub fn set_fail_before(&self, fail: bool) {
        self.fail_before.store(fail, Ordering::SeqCst);
    }

    /// Changes the After behaviour.
    pub fn set_after(&self, action: AfterAction) {
        *self.after.lock() = action;
    }

    /// Number of calls to `hook`.
    #[must_use]
    pub fn calls(&self, hook: Hook) -> usize {
        let counter = match hook {
            Hook::Setup => &self.setup_calls,
            Hook::Before => &self.before_calls,
            Hook::After => &self.after_calls,
            Hook::Shutdown => &self.shutdown_calls,
        };
        counter.load(Ordering::SeqCst)
    }

    /// Codes of the faults received by After, `None` for a clean invocation.
    #[must_use]
    pub fn seen_faults(&self) -> Vec<Option<String>> {
        self.seen_faults.lock().clone()
    }

    fn hook_fault(&self, hook: Hook) -> Fault {
        Fault::framework(
            self.name,
            format!("{}_FAILED", hook.as_str().to_uppercase()),
            format!("{} failed in {}", hook, self.name),
        )
        .build()
    }
}

impl<Req, Res> fmt::Debug for RecordingMiddleware<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingMiddleware")
            .field("name", &self.name)
            .field("setup_calls", &self.calls(Hook::Setup))
            .field("before_calls", &self.calls(Hook::Before))
            .field("after_calls", &self.calls(Hook::After))
            .field("shutdown_calls", &self.calls(Hook::Shutdown))
            .finish_non_exhaustive()
    }
}

impl<Req, Res> Middleware<Req, Res> for RecordingMiddleware<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_setup<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        _first_request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            self.setup_calls.fetch_add(1, Ordering::SeqCst);
            self.log.record(self.name, Hook::Setup);
            let failing = self
                .setup_failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(self.hook_fault(Hook::Setup));
            }
            Ok(())
        })
    }

    fn on_before<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        _request: &'a Req,
    ) -> BoxFuture<'a, FaultResult<()>> {
        Box::pin(async move {
            self.before_calls.fetch_add(1, Ordering::SeqCst);
            self.log.record(self.name, Hook::Before);
            if self.fail_before.load(Ordering::SeqCst) {
                return Err(self.hook_fault(Hook::Before));
            }
            Ok(())
        })
    }

    fn on_after<'a>(
        &'a self,
        _response: &'a mut Res,
        fault: Option<Fault>,
    ) -> BoxFuture<'a, Option<Fault>> {
        Box::pin(async move {
            self.after_calls.fetch_add(1, Ordering::SeqCst);
            self.log.record(self.name, Hook::After);
            self.seen_faults
                .lock()
                .push(fault.as_ref().map(|f| f.code().to_string()));
            match self.after.lock().clone() {
                AfterAction::Forward => fault,
                AfterAction::Replace(replacement) => Some(replacement),
                AfterAction::Clear => None,
            }
        })
    }

    fn on_shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
            self.log.record(self.name, Hook::Shutdown);
        })
    }
}
