//! The VM-thread event loop.
//!
//! A single thread runs hosted code and drains the microtask queue
//! cooperatively; it suspends only between synchronous fragments, either
//! because the queue is empty (awaiting an external completion) or between
//! micro-turns. Settlements from workers are applied here, atomically from
//! the hosted program's point of view: a reaction never observes a
//! half-settled promise.

use std::sync::Arc;
use std::time::Duration;

use paserati_vm_core::{AsyncHost, NativeContext};

use crate::host::RuntimeHost;
use crate::options::{RuntimeOptions, UnhandledRejectionHook};

/// Drives microtasks and settlement jobs to quiescence.
pub struct EventLoop {
    host: Arc<RuntimeHost>,
    settlement_wait: Duration,
    on_unhandled: Option<UnhandledRejectionHook>,
}

impl EventLoop {
    pub fn new(host: Arc<RuntimeHost>, options: &RuntimeOptions) -> Self {
        Self {
            host,
            settlement_wait: options.settlement_wait,
            on_unhandled: options.on_unhandled_rejection.clone(),
        }
    }

    pub fn host(&self) -> &Arc<RuntimeHost> {
        &self.host
    }

    /// Run until the microtask queue is empty, no settlement is pending,
    /// and the external-operation counter has reached zero. Unhandled
    /// rejections that survive to quiescence are reported once each.
    pub fn run_until_complete(&self, cx: &mut NativeContext) {
        loop {
            cx.drain_microtasks();

            // Apply every settlement that is already waiting; microtasks a
            // settlement enqueues run before the next settlement is drained.
            if let Some(job) = self.host.try_recv() {
                job(cx);
                continue;
            }

            if self.host.pending_external_ops() == 0 && cx.microtasks().is_empty() {
                // One final look: a worker may have submitted between the
                // channel check and the counter check.
                match self.host.try_recv() {
                    Some(job) => {
                        job(cx);
                        continue;
                    }
                    None => break,
                }
            }

            // Operations in flight: block briefly for the next settlement.
            if let Some(job) = self.host.recv_timeout(self.settlement_wait) {
                job(cx);
            }
        }
        self.report_unhandled();
    }

    /// Drain whatever is ready without waiting for in-flight operations.
    pub fn pump(&self, cx: &mut NativeContext) {
        cx.drain_microtasks();
        while let Some(job) = self.host.try_recv() {
            job(cx);
            cx.drain_microtasks();
        }
    }

    fn report_unhandled(&self) {
        for (_, reason) in self.host.take_unhandled() {
            match &self.on_unhandled {
                Some(hook) => hook(&reason),
                None => tracing::error!(reason = ?reason, "unhandled promise rejection"),
            }
        }
    }
}
