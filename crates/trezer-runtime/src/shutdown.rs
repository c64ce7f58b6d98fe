//! Termination signal handling.
//!
//! The host sends SIGTERM before freezing an instance for good. A
//! [`ShutdownSignal`] turns that into an awaitable event so the pipeline can
//! drain the in-flight invocation and run every Shutdown hook.
//!
//! # Example
//!
//! ```rust
//! use trezer_runtime::ShutdownSignal;
//!
//! # tokio_test::block_on(async {
//! let shutdown = ShutdownSignal::new();
//! let waiter = shutdown.recv();
//!
//! shutdown.trigger();
//! waiter.await;
//! assert!(shutdown.is_shutdown());
//! # });
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::RuntimeError;

/// A one-shot termination event shared by every clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a signal that only fires through [`trigger`](Self::trigger).
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Fires the signal. Only the first call notifies waiters.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal fired.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Completes when the signal fires, immediately if it already did.
    pub async fn recv(&self) {
        // Subscribe before checking the flag so a concurrent trigger is seen.
        let mut receiver = self.sender.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = receiver.recv().await;
    }

    /// Creates a signal fired by SIGTERM or SIGINT (Ctrl+C elsewhere).
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Signal`] if a handler cannot be registered.
    pub fn with_os_signals() -> Result<Self, RuntimeError> {
        let signal = Self::new();
        let trigger = signal.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal as os_signal, SignalKind};

            let mut sigterm = os_signal(SignalKind::terminate()).map_err(RuntimeError::Signal)?;
            let mut sigint = os_signal(SignalKind::interrupt()).map_err(RuntimeError::Signal)?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
                }
                trigger.trigger();
            });
        }

        #[cfg(not(unix))]
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
                trigger.trigger();
            }
        });

        Ok(signal)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
