//! The `Function` builtin: call/apply/bind on `%Function.prototype%`.
//!
//! The `Function` constructor itself requires the compiler, which is an
//! external collaborator, so constructing functions from source throws.

use paserati_vm_core::builtin_builder::{BuiltInBuilder, native_callable};
use paserati_vm_core::object::{PropertyDescriptor, PropertyKey};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct FunctionBuiltin;

impl Builtin for FunctionBuiltin {
    fn name(&self) -> &'static str {
        "Function"
    }

    fn priority(&self) -> u32 {
        priority::FUNCTION
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_type_alias(
            "Function",
            Type::function(vec![Type::Any], Type::Any),
        );
        tcx.define_global(
            "Function",
            Type::ctor(vec![Type::String], Type::named("Function")),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let function_prototype = realm.function_prototype();

        let (ctor, proto) =
            BuiltInBuilder::with_prototype(&realm, "Function", function_prototype)
                .constructor_fn(
                    |_this, _args, _cx| {
                        Err(VmError::type_error(
                            "Function constructor requires the compiler, which is not available at runtime",
                        ))
                    },
                    1,
                )
                .method("call", function_call, 1)
                .method("apply", function_apply, 2)
                .method("bind", function_bind, 1)
                .method("toString", function_to_string, 0)
                .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::FUNCTION_PROTOTYPE, Value::object(proto));
        rcx.define_global("Function", ctor);
        Ok(())
    }
}

fn function_call(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let this_arg = arg(args, 0).clone();
    let rest = args.get(1..).unwrap_or(&[]);
    cx.call(this, &this_arg, rest)
}

fn function_apply(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let this_arg = arg(args, 0).clone();
    let list = arg(args, 1);
    let call_args = if list.is_nullish() {
        Vec::new()
    } else {
        cx.iterable_to_array(list)?
    };
    cx.call(this, &this_arg, &call_args)
}

fn function_bind(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !this.is_callable() {
        return Err(VmError::type_error("Function.prototype.bind called on non-callable"));
    }
    let target = this.clone();
    let bound_this = arg(args, 0).clone();
    let bound_args: Vec<Value> = args.get(1..).unwrap_or(&[]).to_vec();

    let target_name = target.function_name().unwrap_or_default();
    let bound = native_callable(
        &cx.current_realm(),
        &format!("bound {target_name}"),
        0,
        move |_this, call_args, cx| {
            let mut all = bound_args.clone();
            all.extend_from_slice(call_args);
            cx.call(&target, &bound_this, &all)
        },
    );

    // bound.length = max(0, target.length - bound arg count)
    if let (Some(bound_fn), Some(target_fn)) =
        (bound.as_native_function(), this.as_native_function())
    {
        let target_length = target_fn
            .object
            .get_own(&PropertyKey::string("length"))
            .and_then(|d| d.data_value().and_then(Value::as_number))
            .unwrap_or(0.0);
        let remaining = (target_length - args.len().saturating_sub(1) as f64).max(0.0);
        bound_fn.object.define_own_property_unchecked(
            PropertyKey::string("length"),
            PropertyDescriptor::function_length(Value::number(remaining)),
        );
    }
    Ok(bound)
}

fn function_to_string(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let name = this.function_name().unwrap_or_default();
    Ok(Value::string(format!(
        "function {name}() {{ [native code] }}"
    )))
}
