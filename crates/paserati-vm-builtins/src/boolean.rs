//! The `Boolean` wrapper builtin.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::JsObject;
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const PRIMITIVE_SLOT: &str = "[[PrimitiveValue]]";

pub struct BooleanBuiltin;

impl Builtin for BooleanBuiltin {
    fn name(&self) -> &'static str {
        "Boolean"
    }

    fn priority(&self) -> u32 {
        priority::BOOLEAN
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global("Boolean", Type::function(vec![Type::Any], Type::Boolean));
        tcx.set_primitive_prototype(
            "boolean",
            Type::Object(vec![(
                "valueOf".into(),
                Type::function(vec![], Type::Boolean),
            )]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let (ctor, proto) = BuiltInBuilder::new(&realm, "Boolean")
            .constructor_fn(boolean_constructor, 1)
            .method("toString", boolean_to_string, 0)
            .method("valueOf", boolean_value_of, 0)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::BOOLEAN_PROTOTYPE, Value::object(proto));
        rcx.define_global("Boolean", ctor);
        Ok(())
    }
}

fn boolean_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let primitive = arg(args, 0).to_boolean();
    if !cx.is_constructor_call() {
        return Ok(Value::boolean(primitive));
    }
    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::BOOLEAN_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    obj.set_internal_slot(PRIMITIVE_SLOT, Value::boolean(primitive));
    Ok(Value::object(obj))
}

fn this_boolean(this: &Value, what: &str) -> VmResult<bool> {
    if let Some(b) = this.as_boolean() {
        return Ok(b);
    }
    if let Some(obj) = this.as_object() {
        if let Some(Value::Boolean(b)) = obj.internal_slot(PRIMITIVE_SLOT) {
            return Ok(b);
        }
    }
    Err(VmError::type_error(format!(
        "{what} requires a boolean receiver"
    )))
}

fn boolean_to_string(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let b = this_boolean(this, "Boolean.prototype.toString")?;
    Ok(Value::string(if b { "true" } else { "false" }))
}

fn boolean_value_of(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    Ok(Value::boolean(this_boolean(
        this,
        "Boolean.prototype.valueOf",
    )?))
}
