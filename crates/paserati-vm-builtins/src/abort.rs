//! `AbortController` / `AbortSignal`.
//!
//! Signals are plain user-visible objects carrying `aborted` and `reason`.
//! There is no listener infrastructure: consumers check `aborted`
//! synchronously at call time and in-flight operations poll it at a fixed
//! interval.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const SIGNAL_SLOT: &str = "[[AbortSignal]]";

pub struct AbortBuiltin;

impl Builtin for AbortBuiltin {
    fn name(&self) -> &'static str {
        "AbortController"
    }

    fn priority(&self) -> u32 {
        priority::ABORT
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let signal = Type::Object(vec![
            ("aborted".into(), Type::Boolean),
            ("reason".into(), Type::Any),
        ]);
        tcx.define_type_alias("AbortSignal", signal.clone());
        tcx.define_global(
            "AbortController",
            Type::ctor(
                vec![],
                Type::Object(vec![
                    ("signal".into(), Type::named("AbortSignal")),
                    ("abort".into(), Type::function(vec![Type::Any], Type::Void)),
                ]),
            ),
        );
        tcx.define_global("AbortSignal", Type::ctor(vec![], signal));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();

        let (signal_ctor, signal_proto) = BuiltInBuilder::new(&realm, "AbortSignal")
            .constructor_fn(
                |_this, _args, _cx| Err(VmError::type_error("Illegal constructor")),
                0,
            )
            .static_method("abort", abort_signal_abort, 0)
            .build_with_statics();
        rcx.set_intrinsic(
            intrinsic_keys::ABORT_SIGNAL_PROTOTYPE,
            Value::object(signal_proto),
        );
        rcx.define_global("AbortSignal", signal_ctor);

        let (controller_ctor, controller_proto) = BuiltInBuilder::new(&realm, "AbortController")
            .constructor_fn(abort_controller_constructor, 0)
            .accessor("signal", controller_signal)
            .method("abort", controller_abort, 0)
            .build_with_statics();
        rcx.set_intrinsic(
            intrinsic_keys::ABORT_CONTROLLER_PROTOTYPE,
            Value::object(controller_proto),
        );
        rcx.define_global("AbortController", controller_ctor);
        Ok(())
    }
}

/// Allocate a signal object, optionally already aborted.
pub fn new_signal(realm: &Realm, aborted: bool, reason: Value) -> Value {
    let proto = realm.intrinsic_object(intrinsic_keys::ABORT_SIGNAL_PROTOTYPE);
    let signal = JsObject::alloc(proto);
    signal.set_own_non_enumerable(PropertyKey::string("aborted"), Value::boolean(aborted));
    signal.set_own_non_enumerable(PropertyKey::string("reason"), reason);
    Value::object(signal)
}

/// Flip a signal to the aborted state. Aborting twice keeps the first
/// reason.
pub fn abort_signal(signal: &GcRef<JsObject>, reason: Value) {
    let already = signal
        .get_own(&PropertyKey::string("aborted"))
        .and_then(|d| d.data_value().cloned())
        .is_some_and(|v| v.to_boolean());
    if already {
        return;
    }
    signal.set_own_non_enumerable(PropertyKey::string("aborted"), Value::boolean(true));
    signal.set_own_non_enumerable(PropertyKey::string("reason"), reason);
}

fn abort_controller_constructor(
    _this: &Value,
    _args: &[Value],
    cx: &mut NativeContext,
) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error(
            "Constructor AbortController requires 'new'",
        ));
    }
    let realm = cx.current_realm();
    let target = cx.new_target().clone();
    let proto =
        cx.get_prototype_from_constructor(&target, intrinsic_keys::ABORT_CONTROLLER_PROTOTYPE)?;
    let controller = JsObject::alloc(proto);
    controller.set_internal_slot(SIGNAL_SLOT, new_signal(&realm, false, Value::Undefined));
    Ok(Value::object(controller))
}

fn controller_signal(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let obj = this
        .as_object()
        .filter(|o| o.has_internal_slot(SIGNAL_SLOT))
        .ok_or_else(|| VmError::type_error("signal requires an AbortController receiver"))?;
    Ok(obj.internal_slot(SIGNAL_SLOT).unwrap_or(Value::Undefined))
}

fn controller_abort(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let obj = this
        .as_object()
        .filter(|o| o.has_internal_slot(SIGNAL_SLOT))
        .ok_or_else(|| VmError::type_error("abort requires an AbortController receiver"))?;
    if let Some(signal) = obj.internal_slot(SIGNAL_SLOT).and_then(|v| v.as_object()) {
        abort_signal(&signal, arg(args, 0).clone());
    }
    Ok(Value::Undefined)
}

fn abort_signal_abort(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    Ok(new_signal(
        &cx.current_realm(),
        true,
        arg(args, 0).clone(),
    ))
}
