//! Runtime configuration.

use std::sync::Arc;
use std::time::Duration;

use paserati_vm_core::Value;

/// Hook invoked once per promise whose rejection was never handled.
pub type UnhandledRejectionHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// Knobs for the event loop and worker pool.
#[derive(Clone)]
pub struct RuntimeOptions {
    /// Worker threads backing native async operations.
    pub worker_threads: usize,
    /// Fixed interval at which in-flight operations poll their abort signal.
    pub signal_poll_interval: Duration,
    /// How long the VM thread blocks waiting for a settlement before
    /// re-checking its exit conditions.
    pub settlement_wait: Duration,
    /// Unhandled-rejection reporter; defaults to a `tracing` error event.
    pub on_unhandled_rejection: Option<UnhandledRejectionHook>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            signal_poll_interval: Duration::from_millis(50),
            settlement_wait: Duration::from_millis(25),
            on_unhandled_rejection: None,
        }
    }
}

impl std::fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("worker_threads", &self.worker_threads)
            .field("signal_poll_interval", &self.signal_poll_interval)
            .field("settlement_wait", &self.settlement_wait)
            .field(
                "on_unhandled_rejection",
                &self.on_unhandled_rejection.is_some(),
            )
            .finish()
    }
}
