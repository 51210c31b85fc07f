//! Shared plumbing for the end-to-end tests.
#![allow(dead_code)]

use std::sync::Arc;

use paserati_vm_builtins::engine::Engine;
use paserati_vm_builtins::fetch::transport::MockTransport;
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::{NativeContext, Value, VmResult};

pub fn engine() -> Engine {
    Engine::new().expect("engine bootstrap")
}

pub fn engine_with_mock() -> (Engine, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let engine = Engine::with_transport(transport.clone()).expect("engine bootstrap");
    (engine, transport)
}

pub fn global(engine: &Engine, cx: &mut NativeContext, name: &str) -> Value {
    let global = Value::object(engine.realm().global.clone());
    cx.get(&global, &PropertyKey::string(name))
        .unwrap_or_else(|e| panic!("global {name}: {e}"))
}

/// `new ctor(...args)`.
pub fn construct(cx: &mut NativeContext, ctor: &Value, args: &[Value]) -> VmResult<Value> {
    cx.construct(ctor, args, None)
}

/// `target.method(...args)`.
pub fn call_method(
    cx: &mut NativeContext,
    target: &Value,
    name: &str,
    args: &[Value],
) -> VmResult<Value> {
    let method = cx.get(target, &PropertyKey::string(name))?;
    cx.call(&method, target, args)
}

pub fn get(cx: &mut NativeContext, target: &Value, name: &str) -> Value {
    cx.get(target, &PropertyKey::string(name))
        .unwrap_or_else(|e| panic!("get {name}: {e}"))
}

pub fn string_of(value: &Value) -> String {
    value
        .as_string()
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| panic!("expected string, got {value:?}"))
}

pub fn number_of(value: &Value) -> f64 {
    value
        .as_number()
        .unwrap_or_else(|| panic!("expected number, got {value:?}"))
}
