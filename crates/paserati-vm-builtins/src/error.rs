//! The `Error` family: `Error` plus its seven native subclasses.
//!
//! Error instances are ordinary objects carrying the `[[ErrorData]]`
//! internal slot; `Error.isError` tests that slot and never walks the
//! prototype chain. Subclass constructors resolve the instance prototype
//! from `new.target` through the realm's intrinsic slots, so cross-realm
//! construction lands in the right realm.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::value::ERROR_DATA_SLOT;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const SUBCLASSES: [&str; 7] = [
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
    "AggregateError",
];

fn prototype_slot(name: &str) -> String {
    format!("%{name}Prototype%")
}

pub struct ErrorBuiltin;

impl Builtin for ErrorBuiltin {
    fn name(&self) -> &'static str {
        "Error"
    }

    fn priority(&self) -> u32 {
        priority::ERROR
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let instance = Type::Object(vec![
            ("name".into(), Type::String),
            ("message".into(), Type::String),
            ("stack".into(), Type::String),
        ]);
        tcx.define_type_alias("Error", instance.clone());
        tcx.define_global("Error", Type::ctor(vec![Type::String], instance));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "Error")
            .constructor_fn(error_constructor, 1)
            .method("toString", error_to_string, 0)
            .property(
                PropertyKey::string("name"),
                Value::string("Error"),
                paserati_vm_core::object::PropertyAttributes::builtin_method(),
            )
            .property(
                PropertyKey::string("message"),
                Value::string(""),
                paserati_vm_core::object::PropertyAttributes::builtin_method(),
            )
            .static_method("isError", error_is_error, 1)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::ERROR_PROTOTYPE, Value::object(proto));
        rcx.set_intrinsic(intrinsic_keys::ERROR_CONSTRUCTOR, ctor.clone());
        rcx.define_global("Error", ctor);
        Ok(())
    }
}

pub struct ErrorSubclassesBuiltin;

impl Builtin for ErrorSubclassesBuiltin {
    fn name(&self) -> &'static str {
        "ErrorSubclasses"
    }

    fn priority(&self) -> u32 {
        priority::ERROR_SUBCLASS
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        for name in SUBCLASSES {
            tcx.define_global(
                name,
                Type::ctor(vec![Type::String], Type::named("Error")),
            );
        }
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let error_prototype = rcx.intrinsic_object(intrinsic_keys::ERROR_PROTOTYPE)?;
        let error_ctor = realm
            .intrinsic(intrinsic_keys::ERROR_CONSTRUCTOR)
            .ok_or_else(|| VmError::internal("%Error% not installed"))?;
        let error_ctor_object = error_ctor
            .as_native_function()
            .ok_or_else(|| VmError::internal("%Error% is not callable"))?
            .object
            .clone();

        for name in SUBCLASSES {
            let slot = prototype_slot(name);
            let arity = if name == "AggregateError" { 2 } else { 1 };
            let ctor_slot = slot.clone();
            let subclass_name: &'static str = name;

            let (ctor, proto) = BuiltInBuilder::new(&realm, name)
                .inherits(error_prototype.clone())
                .constructor_inherits(error_ctor_object.clone())
                .constructor_fn(
                    move |this, args, cx| {
                        subclass_constructor(this, args, cx, subclass_name, &ctor_slot)
                    },
                    arity,
                )
                .property(
                    PropertyKey::string("name"),
                    Value::string(name),
                    paserati_vm_core::object::PropertyAttributes::builtin_method(),
                )
                .property(
                    PropertyKey::string("message"),
                    Value::string(""),
                    paserati_vm_core::object::PropertyAttributes::builtin_method(),
                )
                .build_with_statics();

            rcx.set_intrinsic(slot, Value::object(proto));
            rcx.define_global(name, ctor);
        }
        Ok(())
    }
}

/// Shared instance setup: `[[ErrorData]]`, `message`, `stack`, `cause`.
fn install_error_slots(
    cx: &mut NativeContext,
    obj: &GcRef<JsObject>,
    message: &Value,
    options: &Value,
) -> VmResult<()> {
    obj.set_internal_slot(ERROR_DATA_SLOT, Value::boolean(true));

    if !message.is_undefined() {
        let text = cx.to_string_value(message)?;
        obj.set_own_non_enumerable(PropertyKey::string("message"), Value::String(text));
    }

    let stack = cx.capture_stack_trace();
    obj.set_own_non_enumerable(PropertyKey::string("stack"), Value::string(stack));

    if options.is_object() {
        let options_obj = options.as_object().expect("checked is_object");
        if options_obj.has_own(&PropertyKey::string("cause")) {
            let cause = cx.get(options, &PropertyKey::string("cause"))?;
            obj.set_own_non_enumerable(PropertyKey::string("cause"), cause);
        }
    }
    Ok(())
}

fn resolve_instance_prototype(
    cx: &mut NativeContext,
    slot: &str,
) -> VmResult<Option<GcRef<JsObject>>> {
    if cx.is_constructor_call() {
        let target = cx.new_target().clone();
        cx.get_prototype_from_constructor(&target, slot)
    } else {
        Ok(cx.current_realm().intrinsic_object(slot))
    }
}

fn error_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let proto = resolve_instance_prototype(cx, intrinsic_keys::ERROR_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    install_error_slots(cx, &obj, arg(args, 0), arg(args, 1))?;
    Ok(Value::object(obj))
}

fn subclass_constructor(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
    name: &str,
    slot: &str,
) -> VmResult<Value> {
    let proto = resolve_instance_prototype(cx, slot)?;
    let obj = JsObject::alloc(proto);

    if name == "AggregateError" {
        // AggregateError(errors, message, options): the iterable comes
        // first and lands in an own `errors` array.
        let errors = cx.iterable_to_array(arg(args, 0))?;
        install_error_slots(cx, &obj, arg(args, 1), arg(args, 2))?;
        obj.set_own_non_enumerable(
            PropertyKey::string("errors"),
            new_array(&cx.current_realm(), errors),
        );
    } else {
        install_error_slots(cx, &obj, arg(args, 0), arg(args, 1))?;
    }
    Ok(Value::object(obj))
}

fn error_to_string(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !this.is_object() {
        return Err(VmError::type_error(
            "Error.prototype.toString called on a non-object receiver",
        ));
    }
    let name = match cx.get(this, &PropertyKey::string("name"))? {
        Value::Undefined => "Error".to_string(),
        other => cx.to_string_value(&other)?.as_str().to_string(),
    };
    let message = match cx.get(this, &PropertyKey::string("message"))? {
        Value::Undefined => String::new(),
        other => cx.to_string_value(&other)?.as_str().to_string(),
    };
    Ok(Value::string(match (name.is_empty(), message.is_empty()) {
        (true, _) => message,
        (false, true) => name,
        (false, false) => format!("{name}: {message}"),
    }))
}

fn error_is_error(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    Ok(Value::boolean(arg(args, 0).is_error_data()))
}
