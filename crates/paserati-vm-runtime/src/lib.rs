//! Event loop and async host for the Paserati runtime core.
//!
//! Scheduling model: one VM thread runs hosted code and drains microtasks;
//! tokio workers perform bounded external operations and publish results
//! only through the settlement channel.

pub mod event_loop;
pub mod host;
pub mod options;

pub use event_loop::EventLoop;
pub use host::RuntimeHost;
pub use options::{RuntimeOptions, UnhandledRejectionHook};

#[cfg(test)]
mod tests {
    use super::*;
    use paserati_vm_core::context::AsyncHost;
    use paserati_vm_core::microtask::MicrotaskQueue;
    use paserati_vm_core::promise::JsPromise;
    use paserati_vm_core::realm::RealmRegistry;
    use paserati_vm_core::{NativeContext, Value};
    use std::sync::Arc;

    fn test_setup() -> (Arc<RuntimeHost>, EventLoop, NativeContext) {
        let options = RuntimeOptions::default();
        let host = Arc::new(RuntimeHost::new(&options).unwrap());
        let event_loop = EventLoop::new(host.clone(), &options);
        let realms = RealmRegistry::new();
        let realm = realms.create_realm();
        let cx = NativeContext::new(
            realms,
            realm,
            Arc::new(MicrotaskQueue::new()),
            host.clone(),
        );
        (host, event_loop, cx)
    }

    #[test]
    fn test_loop_waits_for_external_op() {
        let (host, event_loop, mut cx) = test_setup();
        let promise = JsPromise::new_pending();

        // Simulate a worker: operation registered before spawn, settlement
        // submitted from the worker, end-op after submit.
        host.begin_external_op();
        let worker_host = host.clone();
        let worker_promise = promise.clone();
        host.spawn_worker(Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            worker_host.submit(Box::new(move |cx| {
                cx.resolve_promise(&worker_promise, Value::int32(99));
            }));
            worker_host.end_external_op();
        }));

        // The loop must stay alive until the worker settles, even though the
        // microtask queue starts empty.
        event_loop.run_until_complete(&mut cx);
        assert!(promise.is_fulfilled());
        assert_eq!(promise.value().unwrap().as_int32(), Some(99));
    }

    #[test]
    fn test_quiescent_loop_returns_immediately() {
        let (_host, event_loop, mut cx) = test_setup();
        event_loop.run_until_complete(&mut cx);
    }

    #[test]
    fn test_unhandled_rejection_reported_once() {
        let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let hook_log = reported.clone();
        let mut options = RuntimeOptions::default();
        options.on_unhandled_rejection = Some(Arc::new(move |reason: &Value| {
            hook_log
                .lock()
                .push(reason.as_string().map(|s| s.as_str().to_string()));
        }));
        let host = Arc::new(RuntimeHost::new(&options).unwrap());
        let event_loop = EventLoop::new(host.clone(), &options);
        let realms = RealmRegistry::new();
        let realm = realms.create_realm();
        let mut cx = NativeContext::new(
            realms,
            realm,
            Arc::new(MicrotaskQueue::new()),
            host.clone(),
        );

        let promise = JsPromise::new_pending();
        cx.reject_promise(&promise, Value::string("boom"));
        event_loop.run_until_complete(&mut cx);
        event_loop.run_until_complete(&mut cx);

        let log = reported.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].as_deref(), Some("boom"));
    }
}
