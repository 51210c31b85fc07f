//! The tokio-backed async host.
//!
//! Workers execute on a tokio pool and communicate with the VM thread only
//! through the settlement channel: a worker packages its result as a
//! completion job, submits it, and the VM thread runs the job between
//! synchronous fragments. The external-operation counter keeps the event
//! loop alive while operations are in flight even when no microtasks are
//! queued.

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use paserati_vm_core::context::{AsyncHost, SettlementJob, WorkerFuture};
use paserati_vm_core::gc::GcRef;
use paserati_vm_core::promise::JsPromise;
use paserati_vm_core::Value;

use crate::options::RuntimeOptions;

/// Production [`AsyncHost`] over a tokio runtime and a crossbeam settlement
/// channel.
pub struct RuntimeHost {
    tokio: tokio::runtime::Runtime,
    external_ops: AtomicUsize,
    tx: Sender<SettlementJob>,
    rx: Receiver<SettlementJob>,
    /// Rejections that settled without a handler; survivors are reported at
    /// quiescence.
    unhandled: Mutex<Vec<(GcRef<JsPromise>, Value)>>,
    /// Fixed abort-signal polling interval handed to workers.
    pub signal_poll_interval: Duration,
}

impl RuntimeHost {
    pub fn new(options: &RuntimeOptions) -> std::io::Result<Self> {
        let tokio = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(options.worker_threads.max(1))
            .enable_all()
            .build()?;
        let (tx, rx) = unbounded();
        Ok(Self {
            tokio,
            external_ops: AtomicUsize::new(0),
            tx,
            rx,
            unhandled: Mutex::new(Vec::new()),
            signal_poll_interval: options.signal_poll_interval,
        })
    }

    /// Non-blocking settlement receive.
    pub fn try_recv(&self) -> Option<SettlementJob> {
        match self.rx.try_recv() {
            Ok(job) => Some(job),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocking settlement receive with a deadline.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SettlementJob> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Promises whose rejection is still unhandled, each reported once.
    pub fn take_unhandled(&self) -> Vec<(GcRef<JsPromise>, Value)> {
        let mut noted = self.unhandled.lock();
        let mut survivors = Vec::new();
        for (promise, reason) in noted.drain(..) {
            if !promise.is_handled() {
                survivors.push((promise, reason));
            }
        }
        survivors
    }
}

impl AsyncHost for RuntimeHost {
    fn begin_external_op(&self) {
        self.external_ops.fetch_add(1, Ordering::SeqCst);
    }

    fn end_external_op(&self) {
        self.external_ops.fetch_sub(1, Ordering::SeqCst);
    }

    fn pending_external_ops(&self) -> usize {
        self.external_ops.load(Ordering::SeqCst)
    }

    fn submit(&self, job: SettlementJob) {
        // The channel is unbounded and the receiver lives as long as the
        // host, so a failed send only happens during teardown.
        let _ = self.tx.send(job);
    }

    fn spawn_worker(&self, fut: WorkerFuture) {
        self.tokio.spawn(fut);
    }

    fn note_unhandled_rejection(&self, promise: GcRef<JsPromise>, reason: Value) {
        self.unhandled.lock().push((promise, reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_external_op_counter() {
        let host = RuntimeHost::new(&RuntimeOptions::default()).unwrap();
        assert_eq!(host.pending_external_ops(), 0);
        host.begin_external_op();
        host.begin_external_op();
        assert_eq!(host.pending_external_ops(), 2);
        host.end_external_op();
        assert_eq!(host.pending_external_ops(), 1);
    }

    #[test]
    fn test_settlement_channel_crosses_threads() {
        let host = Arc::new(RuntimeHost::new(&RuntimeOptions::default()).unwrap());
        let worker_host = host.clone();
        host.begin_external_op();
        host.spawn_worker(Box::pin(async move {
            worker_host.submit(Box::new(|_cx| {}));
            worker_host.end_external_op();
        }));

        let job = host.recv_timeout(Duration::from_secs(5));
        assert!(job.is_some());
    }

    #[test]
    fn test_unhandled_survivors_filtered() {
        let host = RuntimeHost::new(&RuntimeOptions::default()).unwrap();
        let handled = JsPromise::new_pending();
        let orphan = JsPromise::new_pending();
        host.note_unhandled_rejection(handled.clone(), Value::string("a"));
        host.note_unhandled_rejection(orphan.clone(), Value::string("b"));
        handled.mark_handled();

        let survivors = host.take_unhandled();
        assert_eq!(survivors.len(), 1);
        assert!(GcRef::ptr_eq(&survivors[0].0, &orphan));
    }
}
