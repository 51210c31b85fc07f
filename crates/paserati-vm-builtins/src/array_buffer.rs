//! The `ArrayBuffer` and `SharedArrayBuffer` builtins.

use paserati_vm_core::array_buffer::JsArrayBuffer;
use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert;
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::shared_buffer::SharedArrayBuffer;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct ArrayBufferBuiltin;

impl Builtin for ArrayBufferBuiltin {
    fn name(&self) -> &'static str {
        "ArrayBuffer"
    }

    fn priority(&self) -> u32 {
        priority::ARRAY_BUFFER
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let instance = Type::Object(vec![
            ("byteLength".into(), Type::Number),
            (
                "slice".into(),
                Type::function(vec![Type::Number, Type::Number], Type::named("ArrayBuffer")),
            ),
        ]);
        tcx.define_type_alias("ArrayBuffer", instance.clone());
        tcx.define_global("ArrayBuffer", Type::ctor(vec![Type::Number], instance.clone()));
        tcx.define_type_alias("SharedArrayBuffer", instance.clone());
        tcx.define_global("SharedArrayBuffer", Type::ctor(vec![Type::Number], instance));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "ArrayBuffer")
            .constructor_fn(array_buffer_constructor, 1)
            .accessor("byteLength", array_buffer_byte_length)
            .method("slice", array_buffer_slice, 2)
            .static_method("isView", array_buffer_is_view, 1)
            .build_with_statics();
        rcx.set_intrinsic(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE, Value::object(proto));
        rcx.define_global("ArrayBuffer", ctor);

        let (shared_ctor, shared_proto) = BuiltInBuilder::new(&realm, "SharedArrayBuffer")
            .constructor_fn(shared_array_buffer_constructor, 1)
            .accessor("byteLength", shared_byte_length)
            .build_with_statics();
        rcx.set_intrinsic(
            intrinsic_keys::SHARED_ARRAY_BUFFER_PROTOTYPE,
            Value::object(shared_proto),
        );
        rcx.define_global("SharedArrayBuffer", shared_ctor);
        Ok(())
    }
}

fn requested_length(cx: &mut NativeContext, value: &Value) -> VmResult<usize> {
    let n = cx.to_number(value)?;
    let len = convert::to_integer_or_infinity(n);
    if len < 0.0 || !len.is_finite() || len > u32::MAX as f64 {
        return Err(VmError::range_error("Invalid array buffer length"));
    }
    Ok(len as usize)
}

fn array_buffer_constructor(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor ArrayBuffer requires 'new'"));
    }
    let length = requested_length(cx, arg(args, 0))?;
    let target = cx.new_target().clone();
    let proto =
        cx.get_prototype_from_constructor(&target, intrinsic_keys::ARRAY_BUFFER_PROTOTYPE)?;
    Ok(Value::ArrayBuffer(JsArrayBuffer::new(length, proto)))
}

fn shared_array_buffer_constructor(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error(
            "Constructor SharedArrayBuffer requires 'new'",
        ));
    }
    let length = requested_length(cx, arg(args, 0))?;
    let target = cx.new_target().clone();
    let proto = cx
        .get_prototype_from_constructor(&target, intrinsic_keys::SHARED_ARRAY_BUFFER_PROTOTYPE)?;
    Ok(Value::SharedArrayBuffer(SharedArrayBuffer::new(
        length, proto,
    )))
}

fn array_buffer_byte_length(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(buffer) = this.as_array_buffer() else {
        return Err(VmError::type_error(
            "byteLength requires an ArrayBuffer receiver",
        ));
    };
    Ok(Value::number(buffer.byte_length() as f64))
}

fn shared_byte_length(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(buffer) = this.as_shared_array_buffer() else {
        return Err(VmError::type_error(
            "byteLength requires a SharedArrayBuffer receiver",
        ));
    };
    Ok(Value::number(buffer.byte_length() as f64))
}

fn array_buffer_slice(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(buffer) = this.as_array_buffer() else {
        return Err(VmError::type_error("slice requires an ArrayBuffer receiver"));
    };
    if buffer.is_detached() {
        return Err(VmError::type_error("Cannot slice a detached ArrayBuffer"));
    }
    let len = buffer.byte_length();
    let start = convert::relative_index(cx.to_number(arg(args, 0)).unwrap_or(0.0), len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    let bytes = buffer
        .slice_bytes(start, end)
        .ok_or_else(|| VmError::type_error("ArrayBuffer was detached during slice"))?;
    let proto = cx
        .current_realm()
        .intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
    Ok(Value::ArrayBuffer(JsArrayBuffer::from_bytes(bytes, proto)))
}

fn array_buffer_is_view(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    Ok(Value::boolean(arg(args, 0).is_typed_array()))
}
