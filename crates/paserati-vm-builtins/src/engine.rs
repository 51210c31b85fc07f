//! Embedder facade: wires a realm, the event loop, and the builtin
//! pipeline together.

use std::sync::Arc;

use paserati_vm_core::microtask::MicrotaskQueue;
use paserati_vm_core::realm::Realm;
use paserati_vm_core::{NativeContext, RealmRegistry, VmError, VmResult};
use paserati_vm_runtime::{EventLoop, RuntimeHost, RuntimeOptions};

use crate::fetch::FetchBuiltin;
use crate::fetch::transport::Transport;
use crate::types::TypeEnvironment;

/// A bootstrapped runtime: one realm populated with every builtin, plus the
/// event loop that drives its asynchronous work.
pub struct Engine {
    realms: Arc<RealmRegistry>,
    realm: Realm,
    microtasks: Arc<MicrotaskQueue>,
    host: Arc<RuntimeHost>,
    event_loop: EventLoop,
    types: TypeEnvironment,
    options: RuntimeOptions,
    transport: Option<std::sync::Arc<dyn Transport>>,
}

impl Engine {
    pub fn new() -> VmResult<Engine> {
        Self::with_options(RuntimeOptions::default())
    }

    /// Bootstrap with a substituted fetch transport (tests use the mock).
    pub fn with_transport(transport: std::sync::Arc<dyn Transport>) -> VmResult<Engine> {
        Self::build(RuntimeOptions::default(), Some(transport))
    }

    pub fn with_options(options: RuntimeOptions) -> VmResult<Engine> {
        Self::build(options, None)
    }

    fn build(
        options: RuntimeOptions,
        transport: Option<std::sync::Arc<dyn Transport>>,
    ) -> VmResult<Engine> {
        let host = Arc::new(
            RuntimeHost::new(&options)
                .map_err(|e| VmError::internal(format!("failed to start worker pool: {e}")))?,
        );
        let event_loop = EventLoop::new(host.clone(), &options);
        let realms = RealmRegistry::new();
        let realm = realms.create_realm();
        let microtasks = Arc::new(MicrotaskQueue::new());

        let mut engine = Engine {
            realms,
            realm,
            microtasks,
            host,
            event_loop,
            types: TypeEnvironment::new(),
            options,
            transport,
        };
        engine.install_builtins()?;
        Ok(engine)
    }

    fn builtin_set(&self) -> Vec<Box<dyn crate::Builtin>> {
        let mut builtins = crate::default_builtins();
        if let Some(transport) = &self.transport {
            builtins.retain(|b| b.name() != "fetch");
            builtins.push(Box::new(
                FetchBuiltin::with_transport(transport.clone())
                    .poll_interval(self.options.signal_poll_interval),
            ));
        }
        builtins
    }

    fn install_builtins(&mut self) -> VmResult<()> {
        let mut cx = self.context();
        let mut builtins = self.builtin_set();
        crate::run_pipeline(&mut builtins, &mut self.types, &mut cx)
    }

    /// A fresh native context over the engine's realm; cheap to create.
    pub fn context(&self) -> NativeContext {
        NativeContext::new(
            self.realms.clone(),
            self.realm.clone(),
            self.microtasks.clone(),
            self.host.clone(),
        )
    }

    /// Create and populate an additional realm with its own copy of every
    /// intrinsic.
    pub fn create_realm(&mut self) -> VmResult<Realm> {
        let realm = self.realms.create_realm();
        let mut cx = NativeContext::new(
            self.realms.clone(),
            realm.clone(),
            self.microtasks.clone(),
            self.host.clone(),
        );
        let mut builtins = self.builtin_set();
        crate::run_pipeline(&mut builtins, &mut self.types, &mut cx)?;
        Ok(realm)
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn host(&self) -> &Arc<RuntimeHost> {
        &self.host
    }

    pub fn types(&self) -> &TypeEnvironment {
        &self.types
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Drive the event loop until microtasks, settlements, and external
    /// operations are all exhausted.
    pub fn run_to_completion(&self, cx: &mut NativeContext) {
        self.event_loop.run_until_complete(cx);
    }

    /// Drain whatever is ready without blocking on in-flight operations.
    pub fn pump(&self, cx: &mut NativeContext) {
        self.event_loop.pump(cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paserati_vm_core::object::PropertyKey;

    #[test]
    fn test_bootstrap_installs_globals() {
        let engine = Engine::new().unwrap();
        let global = &engine.realm().global;
        for name in [
            "Object", "Array", "Symbol", "Error", "TypeError", "RangeError", "Map", "WeakMap",
            "ArrayBuffer", "Uint8Array", "Float64Array", "JSON", "Math", "console", "fetch",
            "Headers", "Request", "Response", "Blob", "AbortController", "String", "Boolean",
        ] {
            assert!(
                global.has_own(&PropertyKey::string(name)),
                "global {name} missing"
            );
        }
    }

    #[test]
    fn test_type_phase_ran() {
        let engine = Engine::new().unwrap();
        assert!(engine.types().global("fetch").is_some());
        assert!(engine.types().global("Map").is_some());
        assert!(engine.types().primitive_prototype("string").is_some());
    }

    #[test]
    fn test_second_realm_has_distinct_intrinsics() {
        let mut engine = Engine::new().unwrap();
        let second = engine.create_realm().unwrap();
        let first = engine.realm();
        let a = first
            .intrinsic_object(paserati_vm_core::realm::intrinsic_keys::ERROR_PROTOTYPE)
            .unwrap();
        let b = second
            .intrinsic_object(paserati_vm_core::realm::intrinsic_keys::ERROR_PROTOTYPE)
            .unwrap();
        assert!(!paserati_vm_core::GcRef::ptr_eq(&a, &b));
    }
}
