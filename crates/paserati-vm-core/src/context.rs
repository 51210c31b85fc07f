//! The native-call context: the VM interface builtins program against.
//!
//! The bytecode interpreter is an external collaborator; `NativeContext` is
//! the slice of it that native code consumes: receiver and `new.target`
//! introspection, re-entrant calls, coercion protocols that call back into
//! hosted code, the iterable protocol, realm access, and promise plumbing.
//! `this` is threaded through the context rather than the function pointer,
//! keeping every native callable on one uniform signature.

use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::convert;
use crate::error::{StackFrame, VmError, VmResult};
use crate::gc::GcRef;
use crate::microtask::MicrotaskQueue;
use crate::object::{JsObject, PropertyDescriptor, PropertyKey};
use crate::promise::{JsPromise, PromiseReaction};
use crate::realm::{Realm, RealmRegistry, intrinsic_keys};
use crate::string::JsString;
use crate::symbol::well_known_symbols;
use crate::value::Value;

/// Native re-entry depth limit.
const MAX_NATIVE_STACK: usize = 256;

/// A completion job produced off the VM thread and executed on it.
pub type SettlementJob = Box<dyn FnOnce(&mut NativeContext) + Send>;

/// A worker future.
pub type WorkerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Host services for asynchronous native operations.
///
/// Workers run concurrently with the VM thread but their only observable
/// effect on hosted state is submitting settlement jobs; the VM thread
/// drains them between synchronous fragments. The external-operation counter
/// keeps the event loop alive while requests are in flight even when the
/// microtask queue is empty.
pub trait AsyncHost: Send + Sync {
    /// Called before spawning a worker for a native operation.
    fn begin_external_op(&self);
    /// Called from the worker when the operation concludes.
    fn end_external_op(&self);
    fn pending_external_ops(&self) -> usize;
    /// Hand a completion job to the VM thread. Safe from any thread.
    fn submit(&self, job: SettlementJob);
    /// Run a worker future on the host's executor.
    fn spawn_worker(&self, fut: WorkerFuture);
    /// Record a rejection that had no handler at settlement time; the event
    /// loop reports survivors once at quiescence.
    fn note_unhandled_rejection(&self, promise: GcRef<JsPromise>, reason: Value);
}

/// Host stub with no executor: external ops are counted, settlement jobs
/// and workers are dropped. Enough for synchronous unit tests.
#[derive(Default)]
pub struct NoopAsyncHost {
    ops: std::sync::atomic::AtomicUsize,
}

impl AsyncHost for NoopAsyncHost {
    fn begin_external_op(&self) {
        self.ops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn end_external_op(&self) {
        self.ops.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }

    fn pending_external_ops(&self) -> usize {
        self.ops.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn submit(&self, _job: SettlementJob) {}

    fn spawn_worker(&self, _fut: WorkerFuture) {}

    fn note_unhandled_rejection(&self, _promise: GcRef<JsPromise>, _reason: Value) {}
}

#[derive(Clone)]
enum PromiseOutcome {
    Fulfilled(Value),
    Rejected(Value),
}

/// ToPrimitive hint.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveHint {
    Default,
    Number,
    String,
}

impl PrimitiveHint {
    fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Number => "number",
            Self::String => "string",
        }
    }
}

/// Per-invocation VM-thread state handed to native functions.
pub struct NativeContext {
    realms: Arc<RealmRegistry>,
    realm: Realm,
    microtasks: Arc<MicrotaskQueue>,
    host: Arc<dyn AsyncHost>,
    this: Value,
    new_target: Value,
    construct: bool,
    stack: SmallVec<[StackFrame; 8]>,
}

impl NativeContext {
    pub fn new(
        realms: Arc<RealmRegistry>,
        realm: Realm,
        microtasks: Arc<MicrotaskQueue>,
        host: Arc<dyn AsyncHost>,
    ) -> Self {
        Self {
            realms,
            realm,
            microtasks,
            host,
            this: Value::Undefined,
            new_target: Value::Undefined,
            construct: false,
            stack: SmallVec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The method receiver of the current native invocation.
    pub fn this_value(&self) -> &Value {
        &self.this
    }

    /// `new.target` of the current invocation; `undefined` for plain calls.
    pub fn new_target(&self) -> &Value {
        &self.new_target
    }

    pub fn is_constructor_call(&self) -> bool {
        self.construct
    }

    pub fn current_realm(&self) -> Realm {
        self.realm.clone()
    }

    pub fn realm_registry(&self) -> &Arc<RealmRegistry> {
        &self.realms
    }

    pub fn microtasks(&self) -> &Arc<MicrotaskQueue> {
        &self.microtasks
    }

    pub fn async_host(&self) -> &Arc<dyn AsyncHost> {
        &self.host
    }

    /// Render the native frames, innermost first.
    pub fn capture_stack_trace(&self) -> String {
        self.stack
            .iter()
            .rev()
            .map(|frame| format!("    at {} (native)", frame.function_name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Synchronous invocation re-entering the VM.
    pub fn call(&mut self, callable: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
        self.invoke(callable, this, args, Value::Undefined, false)
    }

    /// `new` invocation. `new_target` defaults to the constructor itself.
    pub fn construct(
        &mut self,
        ctor: &Value,
        args: &[Value],
        new_target: Option<&Value>,
    ) -> VmResult<Value> {
        let Some(func) = ctor.as_native_function() else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                ctor.type_of()
            )));
        };
        if !func.constructable {
            let name = ctor
                .function_name()
                .unwrap_or_else(|| "value".to_string());
            return Err(VmError::type_error(format!("{name} is not a constructor")));
        }
        let target = new_target.cloned().unwrap_or_else(|| ctor.clone());
        self.invoke(ctor, &Value::Undefined, args, target, true)
    }

    fn invoke(
        &mut self,
        callable: &Value,
        this: &Value,
        args: &[Value],
        new_target: Value,
        construct: bool,
    ) -> VmResult<Value> {
        let Some(func) = callable.as_native_function() else {
            return Err(VmError::type_error(format!(
                "{} is not a function",
                callable.type_of()
            )));
        };
        if self.stack.len() >= MAX_NATIVE_STACK {
            return Err(VmError::StackOverflow);
        }
        let name = callable
            .function_name()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "<anonymous>".to_string());
        self.stack.push(StackFrame {
            function_name: name,
        });

        let handler = func.func.clone();
        let saved_this = std::mem::replace(&mut self.this, this.clone());
        let saved_target = std::mem::replace(&mut self.new_target, new_target);
        let saved_construct = std::mem::replace(&mut self.construct, construct);

        let result = handler(this, args, self);

        self.this = saved_this;
        self.new_target = saved_target;
        self.construct = saved_construct;
        self.stack.pop();
        result
    }

    // ------------------------------------------------------------------
    // Property access with receiver threading
    // ------------------------------------------------------------------

    /// `target[key]`, invoking getters with `this` bound to `target`.
    pub fn get(&mut self, target: &Value, key: &PropertyKey) -> VmResult<Value> {
        self.get_with_receiver(target, key, target)
    }

    /// Prototype-chain read where accessors see the original `receiver`,
    /// not the object the accessor was found on.
    pub fn get_with_receiver(
        &mut self,
        target: &Value,
        key: &PropertyKey,
        receiver: &Value,
    ) -> VmResult<Value> {
        if let Some(fast) = self.get_special(target, key)? {
            return Ok(fast);
        }
        let Some(obj) = self.lookup_object(target)? else {
            return Ok(Value::Undefined);
        };
        match obj.find_property(key) {
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(g), .. }) => {
                self.call(&g, receiver, &[])
            }
            Some(PropertyDescriptor::Accessor { get: None, .. }) => Ok(Value::Undefined),
            None => Ok(Value::Undefined),
        }
    }

    /// `target[key] = value` with setter dispatch on inherited accessors.
    pub fn set(&mut self, target: &Value, key: &PropertyKey, value: Value) -> VmResult<()> {
        if self.set_special(target, key, &value)? {
            return Ok(());
        }
        let Some(obj) = self.lookup_object(target)? else {
            return Err(VmError::type_error(format!(
                "Cannot set property {} on {}",
                key.display(),
                target.type_of()
            )));
        };
        match obj.find_property(key) {
            Some(PropertyDescriptor::Accessor { set: Some(s), .. }) => {
                self.call(&s, target, &[value])?;
                Ok(())
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => Ok(()),
            Some(PropertyDescriptor::Data { attributes, .. }) if !attributes.writable => {
                // Non-writable data property: silent failure.
                Ok(())
            }
            _ => {
                obj.set_own(key.clone(), value);
                Ok(())
            }
        }
    }

    pub fn has_property(&mut self, target: &Value, key: &PropertyKey) -> VmResult<bool> {
        if self.get_special(target, key)?.is_some() {
            return Ok(true);
        }
        Ok(self
            .lookup_object(target)?
            .is_some_and(|obj| obj.has(key)))
    }

    /// Fast paths the object model cannot see: live `length`, canonical
    /// numeric indices on arrays and typed arrays, primitive string access.
    fn get_special(&mut self, target: &Value, key: &PropertyKey) -> VmResult<Option<Value>> {
        match (target, key) {
            (Value::Array(arr), PropertyKey::String(s)) if s == "length" => {
                Ok(Some(Value::number(arr.elements_len() as f64)))
            }
            (Value::Array(arr), PropertyKey::Index(i)) => {
                Ok(Some(arr.element(*i as usize).unwrap_or(Value::Undefined)))
            }
            (Value::TypedArray(ta), PropertyKey::Index(i)) => {
                Ok(Some(ta.get(*i as usize).unwrap_or(Value::Undefined)))
            }
            (Value::String(s), PropertyKey::String(k)) if k == "length" => {
                Ok(Some(Value::number(s.utf16_len() as f64)))
            }
            (Value::String(s), PropertyKey::Index(i)) => {
                let ch = s.as_str().chars().nth(*i as usize);
                Ok(Some(match ch {
                    Some(c) => Value::string(c.to_string()),
                    None => Value::Undefined,
                }))
            }
            _ => Ok(None),
        }
    }

    fn set_special(&mut self, target: &Value, key: &PropertyKey, value: &Value) -> VmResult<bool> {
        match (target, key) {
            (Value::Array(arr), PropertyKey::Index(i)) => {
                arr.set_element(*i as usize, value.clone());
                Ok(true)
            }
            (Value::Array(arr), PropertyKey::String(s)) if s == "length" => {
                let n = self.to_number(value)?;
                let len = convert::to_uint32(n);
                if n.is_nan() || n < 0.0 || n.fract() != 0.0 {
                    return Err(VmError::range_error("Invalid array length"));
                }
                arr.set_elements_len(len as usize);
                Ok(true)
            }
            (Value::TypedArray(ta), PropertyKey::Index(i)) => {
                if ta.kind().is_bigint() {
                    let Some(b) = value.as_bigint() else {
                        return Err(VmError::type_error(
                            "Cannot convert a non-BigInt value to a BigInt element",
                        ));
                    };
                    ta.set_bigint(*i as usize, b);
                } else {
                    let n = self.to_number(value)?;
                    ta.set_f64(*i as usize, n);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The object to run property protocols against: object parts for heap
    /// kinds, wrapper prototypes for primitives, TypeError for nullish.
    fn lookup_object(&mut self, target: &Value) -> VmResult<Option<GcRef<JsObject>>> {
        if let Some(obj) = target.as_object() {
            return Ok(Some(obj));
        }
        let key = match target {
            Value::Undefined | Value::Null => {
                return Err(VmError::type_error(format!(
                    "Cannot read properties of {}",
                    if target.is_null() { "null" } else { "undefined" }
                )));
            }
            Value::String(_) => intrinsic_keys::STRING_PROTOTYPE,
            Value::Boolean(_) => intrinsic_keys::BOOLEAN_PROTOTYPE,
            Value::Symbol(_) => intrinsic_keys::SYMBOL_PROTOTYPE,
            _ => return Ok(None),
        };
        Ok(self.realm.intrinsic_object(key))
    }

    // ------------------------------------------------------------------
    // Coercion protocols that re-enter hosted code
    // ------------------------------------------------------------------

    /// ToPrimitive: `Symbol.toPrimitive`, then `valueOf`, then `toString`
    /// (order flipped for the string hint). First primitive wins.
    pub fn to_primitive(&mut self, value: &Value, hint: PrimitiveHint) -> VmResult<Value> {
        if !value.is_object() {
            return Ok(value.clone());
        }
        let exotic = self.get(
            value,
            &PropertyKey::symbol(well_known_symbols().to_primitive.clone()),
        )?;
        if exotic.is_callable() {
            let result = self.call(&exotic, value, &[Value::string(hint.as_str())])?;
            if !result.is_object() {
                return Ok(result);
            }
            return Err(VmError::type_error(
                "Cannot convert object to primitive value",
            ));
        }
        let methods: [&str; 2] = match hint {
            PrimitiveHint::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in methods {
            let method = self.get(value, &PropertyKey::string(name))?;
            if method.is_callable() {
                let result = self.call(&method, value, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(VmError::type_error(
            "Cannot convert object to primitive value",
        ))
    }

    /// ToNumber.
    pub fn to_number(&mut self, value: &Value) -> VmResult<f64> {
        let primitive = self.to_primitive(value, PrimitiveHint::Number)?;
        convert::primitive_to_number(&primitive)
    }

    /// ToIntegerOrInfinity.
    pub fn to_integer_or_infinity(&mut self, value: &Value) -> VmResult<f64> {
        Ok(convert::to_integer_or_infinity(self.to_number(value)?))
    }

    /// ToString.
    pub fn to_string_value(&mut self, value: &Value) -> VmResult<JsString> {
        let primitive = self.to_primitive(value, PrimitiveHint::String)?;
        convert::primitive_to_string(&primitive).map(JsString::from)
    }

    // ------------------------------------------------------------------
    // Iterable protocol
    // ------------------------------------------------------------------

    /// Exhaust the iterable protocol into a vector. Arrays and typed arrays
    /// take the dense fast path.
    pub fn iterable_to_array(&mut self, value: &Value) -> VmResult<Vec<Value>> {
        if let Value::Array(arr) = value {
            return Ok(arr.elements_snapshot());
        }
        if let Value::TypedArray(ta) = value {
            let mut out = Vec::with_capacity(ta.length());
            for i in 0..ta.length() {
                out.push(ta.get(i).unwrap_or(Value::Undefined));
            }
            return Ok(out);
        }
        if let Value::String(s) = value {
            return Ok(s
                .as_str()
                .chars()
                .map(|c| Value::string(c.to_string()))
                .collect());
        }

        let iter_key = PropertyKey::symbol(well_known_symbols().iterator.clone());
        let method = self.get(value, &iter_key)?;
        if !method.is_callable() {
            return Err(VmError::type_error(format!(
                "{} is not iterable",
                value.type_of()
            )));
        }
        let iterator = self.call(&method, value, &[])?;
        let next = self.get(&iterator, &PropertyKey::string("next"))?;
        if !next.is_callable() {
            return Err(VmError::type_error("Iterator has no callable next method"));
        }
        let mut out = Vec::new();
        loop {
            let step = self.call(&next, &iterator, &[])?;
            let done = self.get(&step, &PropertyKey::string("done"))?;
            if done.to_boolean() {
                break;
            }
            out.push(self.get(&step, &PropertyKey::string("value"))?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Cross-realm construction
    // ------------------------------------------------------------------

    /// Resolve the prototype for a construction from `new.target`: the
    /// target's own `prototype` property when it is an object, else the
    /// intrinsic slot `key` in the target function's realm, else the
    /// current realm's slot.
    pub fn get_prototype_from_constructor(
        &mut self,
        ctor: &Value,
        key: &str,
    ) -> VmResult<Option<GcRef<JsObject>>> {
        if let Some(func) = ctor.as_native_function() {
            if let Some(desc) = func.object.get_own(&PropertyKey::string("prototype")) {
                if let Some(proto) = desc.data_value().and_then(Value::as_object) {
                    return Ok(Some(proto));
                }
            }
            let realm = self
                .realms
                .get(func.realm)
                .unwrap_or_else(|| self.realm.clone());
            return Ok(realm.intrinsic_object(key));
        }
        Ok(self.realm.intrinsic_object(key))
    }

    // ------------------------------------------------------------------
    // Promises
    // ------------------------------------------------------------------

    pub fn new_pending_promise(&mut self) -> Value {
        Value::Promise(JsPromise::new_pending())
    }

    pub fn new_resolved_promise(&mut self, value: Value) -> Value {
        let p = JsPromise::new_pending();
        self.resolve_promise(&p, value);
        Value::Promise(p)
    }

    pub fn new_rejected_promise(&mut self, reason: Value) -> Value {
        let p = JsPromise::new_pending();
        self.reject_promise(&p, reason);
        Value::Promise(p)
    }

    /// Resolve `p` with `value`. Promises adopt the state of a promise
    /// resolution value instead of fulfilling with it. Re-resolution is a
    /// no-op.
    pub fn resolve_promise(&mut self, p: &GcRef<JsPromise>, value: Value) {
        if let Some(inner) = value.as_promise() {
            if GcRef::ptr_eq(inner, p) {
                self.reject_promise(
                    p,
                    Value::string("TypeError: Chaining cycle detected for promise"),
                );
                return;
            }
            let outer = p.clone();
            inner.mark_handled();
            let reaction = PromiseReaction {
                on_fulfilled: None,
                on_rejected: None,
                result: outer,
            };
            if let Some(reaction) = inner.register(reaction) {
                let outcome = match inner.state() {
                    crate::promise::PromiseState::Fulfilled(v) => PromiseOutcome::Fulfilled(v),
                    crate::promise::PromiseState::Rejected(r) => PromiseOutcome::Rejected(r),
                    crate::promise::PromiseState::Pending => return,
                };
                self.schedule_reaction(reaction, outcome);
            }
            return;
        }
        if let Some(reactions) = p.settle_fulfilled(value.clone()) {
            for reaction in reactions {
                self.schedule_reaction(reaction, PromiseOutcome::Fulfilled(value.clone()));
            }
        }
    }

    /// Reject `p` with `reason`; one-shot like resolution. Rejections with
    /// no handler are recorded for the unhandled-rejection report.
    pub fn reject_promise(&mut self, p: &GcRef<JsPromise>, reason: Value) {
        if let Some(reactions) = p.settle_rejected(reason.clone()) {
            if reactions.is_empty() && !p.is_handled() {
                self.host.note_unhandled_rejection(p.clone(), reason.clone());
            }
            for reaction in reactions {
                self.schedule_reaction(reaction, PromiseOutcome::Rejected(reason.clone()));
            }
        }
    }

    /// Register fulfillment/rejection handlers, returning the derived
    /// promise. Handlers run as microtasks in registration order.
    pub fn promise_then(
        &mut self,
        promise: &Value,
        on_fulfilled: Option<Value>,
        on_rejected: Option<Value>,
    ) -> VmResult<Value> {
        let Some(p) = promise.as_promise() else {
            return Err(VmError::type_error("Receiver is not a promise"));
        };
        let result = JsPromise::new_pending();
        let reaction = PromiseReaction {
            on_fulfilled,
            on_rejected,
            result: result.clone(),
        };
        if let Some(reaction) = p.register(reaction) {
            let outcome = match p.state() {
                crate::promise::PromiseState::Fulfilled(v) => PromiseOutcome::Fulfilled(v),
                crate::promise::PromiseState::Rejected(r) => {
                    p.mark_handled();
                    PromiseOutcome::Rejected(r)
                }
                crate::promise::PromiseState::Pending => unreachable!(),
            };
            self.schedule_reaction(reaction, outcome);
        }
        Ok(Value::Promise(result))
    }

    fn schedule_reaction(&mut self, reaction: PromiseReaction, outcome: PromiseOutcome) {
        self.microtasks.enqueue(move |cx| {
            let (handler, payload, rejected) = match &outcome {
                PromiseOutcome::Fulfilled(v) => (&reaction.on_fulfilled, v.clone(), false),
                PromiseOutcome::Rejected(r) => (&reaction.on_rejected, r.clone(), true),
            };
            match handler {
                Some(h) if h.is_callable() => {
                    match cx.call(&h.clone(), &Value::Undefined, &[payload]) {
                        Ok(result) => cx.resolve_promise(&reaction.result, result),
                        Err(err) => cx.reject_promise(&reaction.result, err.to_value()),
                    }
                }
                _ => {
                    // No handler: pass the outcome through to the derived
                    // promise.
                    if rejected {
                        cx.reject_promise(&reaction.result, payload);
                    } else {
                        cx.resolve_promise(&reaction.result, payload);
                    }
                }
            }
        });
    }

    /// Run queued microtasks to exhaustion. Each job is its own micro-turn;
    /// jobs enqueued by a running job execute in the same drain.
    pub fn drain_microtasks(&mut self) {
        let queue = self.microtasks.clone();
        while let Some(job) = queue.dequeue() {
            job(self);
        }
    }
}

impl VmError {
    /// The value a rejected promise carries for this error: the thrown
    /// value itself, or the rendered message for native error variants.
    pub fn to_value(self) -> Value {
        match self {
            VmError::Exception(thrown) => thrown.value,
            other => Value::string(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{NativeFn, NativeFunctionObject};

    fn test_context() -> NativeContext {
        let realms = RealmRegistry::new();
        let realm = realms.create_realm();
        NativeContext::new(
            realms,
            realm,
            Arc::new(MicrotaskQueue::new()),
            Arc::new(NoopAsyncHost::default()),
        )
    }

    fn native(
        cx: &NativeContext,
        f: impl Fn(&Value, &[Value], &mut NativeContext) -> VmResult<Value>
        + Send
        + Sync
        + 'static,
    ) -> Value {
        let func: NativeFn = Arc::new(f);
        let object = JsObject::alloc(Some(cx.current_realm().function_prototype()));
        Value::NativeFunction(GcRef::new(NativeFunctionObject {
            func,
            object,
            realm: cx.current_realm().id,
            constructable: false,
        }))
    }

    #[test]
    fn test_call_threads_this() {
        let mut cx = test_context();
        let f = native(&cx, |this, _args, _cx| Ok(this.clone()));
        let receiver = Value::object(JsObject::alloc(None));
        let result = cx.call(&f, &receiver, &[]).unwrap();
        assert!(convert::strict_equals(&result, &receiver));
        // this is restored after the call
        assert!(cx.this_value().is_undefined());
    }

    #[test]
    fn test_call_non_callable_is_type_error() {
        let mut cx = test_context();
        let err = cx.call(&Value::int32(3), &Value::Undefined, &[]).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_getter_sees_original_receiver() {
        let mut cx = test_context();
        let getter = native(&cx, |this, _args, _cx| Ok(this.clone()));
        let proto = JsObject::alloc(None);
        proto
            .define_accessor(
                PropertyKey::string("self"),
                Some(getter),
                None,
                crate::object::PropertyAttributes::builtin_accessor(),
            )
            .unwrap();
        let obj = Value::object(JsObject::alloc(Some(proto)));
        let got = cx.get(&obj, &PropertyKey::string("self")).unwrap();
        assert!(convert::strict_equals(&got, &obj));
    }

    #[test]
    fn test_promise_single_resolution() {
        let mut cx = test_context();
        let p = JsPromise::new_pending();
        cx.resolve_promise(&p, Value::int32(1));
        cx.resolve_promise(&p, Value::int32(2));
        assert_eq!(p.value().unwrap().as_int32(), Some(1));
    }

    #[test]
    fn test_then_runs_as_microtask() {
        let mut cx = test_context();
        let observed = Arc::new(parking_lot::Mutex::new(None::<i32>));
        let observed_clone = observed.clone();
        let handler = native(&cx, move |_this, args, _cx| {
            *observed_clone.lock() = args.first().and_then(Value::as_int32);
            Ok(Value::Undefined)
        });

        let p = JsPromise::new_pending();
        let value = Value::Promise(p.clone());
        cx.promise_then(&value, Some(handler), None).unwrap();
        cx.resolve_promise(&p, Value::int32(7));

        // Not yet: reactions are queued, not run inline.
        assert!(observed.lock().is_none());
        cx.drain_microtasks();
        assert_eq!(*observed.lock(), Some(7));
    }

    #[test]
    fn test_reaction_order_is_registration_order() {
        let mut cx = test_context();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let p = JsPromise::new_pending();
        let value = Value::Promise(p.clone());
        for i in 0..3 {
            let log = log.clone();
            let handler = native(&cx, move |_this, _args, _cx| {
                log.lock().push(i);
                Ok(Value::Undefined)
            });
            cx.promise_then(&value, Some(handler), None).unwrap();
        }
        cx.resolve_promise(&p, Value::Undefined);
        cx.drain_microtasks();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_iterable_to_array_on_array() {
        let mut cx = test_context();
        let arr = JsObject::alloc_array(0, None);
        arr.push_element(Value::int32(1));
        arr.push_element(Value::int32(2));
        let items = cx.iterable_to_array(&Value::Array(arr)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_int32(), Some(2));
    }

    #[test]
    fn test_non_iterable_is_type_error() {
        let mut cx = test_context();
        let err = cx
            .iterable_to_array(&Value::object(JsObject::alloc(None)))
            .unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_symbol_to_number_through_context() {
        let mut cx = test_context();
        let sym = Value::symbol(crate::symbol::JsSymbol::new(None));
        assert!(cx.to_number(&sym).is_err());
    }
}
