//! The `Blob` builtin: an immutable byte container with a MIME type.

use paserati_vm_core::array_buffer::JsArrayBuffer;
use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::typed_array::TypedArrayKind;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const DATA_SLOT: &str = "[[BlobData]]";
const TYPE_SLOT: &str = "[[BlobType]]";

pub struct BlobBuiltin;

impl Builtin for BlobBuiltin {
    fn name(&self) -> &'static str {
        "Blob"
    }

    fn priority(&self) -> u32 {
        priority::BLOB
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let instance = Type::Object(vec![
            ("size".into(), Type::Number),
            ("type".into(), Type::String),
            (
                "text".into(),
                Type::function(vec![], Type::promise_of(Type::String)),
            ),
            (
                "arrayBuffer".into(),
                Type::function(vec![], Type::promise_of(Type::named("ArrayBuffer"))),
            ),
        ]);
        tcx.define_type_alias("Blob", instance.clone());
        tcx.define_global("Blob", Type::ctor(vec![Type::Any, Type::Any], instance));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let (ctor, proto) = BuiltInBuilder::new(&realm, "Blob")
            .constructor_fn(blob_constructor, 0)
            .accessor("size", blob_size)
            .accessor("type", blob_type)
            .method("slice", blob_slice, 3)
            .method("text", blob_text, 0)
            .method("arrayBuffer", blob_array_buffer, 0)
            .method("bytes", blob_bytes_method, 0)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::BLOB_PROTOTYPE, Value::object(proto));
        rcx.define_global("Blob", ctor);
        Ok(())
    }
}

/// Build a Blob value directly from native code (`Response.blob`).
pub fn new_blob_value(realm: &Realm, bytes: Vec<u8>, content_type: &str) -> Value {
    let proto = realm.intrinsic_object(intrinsic_keys::BLOB_PROTOTYPE);
    let obj = JsObject::alloc(proto);
    obj.set_internal_slot(
        DATA_SLOT,
        Value::ArrayBuffer(JsArrayBuffer::from_bytes(bytes, None)),
    );
    obj.set_internal_slot(TYPE_SLOT, Value::string(content_type.to_ascii_lowercase()));
    Value::object(obj)
}

fn this_blob(this: &Value, what: &str) -> VmResult<(GcRef<JsObject>, Vec<u8>, String)> {
    let obj = this
        .as_object()
        .filter(|o| o.has_internal_slot(DATA_SLOT))
        .ok_or_else(|| VmError::type_error(format!("{what} requires a Blob receiver")))?;
    let bytes = match obj.internal_slot(DATA_SLOT) {
        Some(Value::ArrayBuffer(buffer)) => buffer
            .with_data(<[u8]>::to_vec)
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let content_type = obj
        .internal_slot(TYPE_SLOT)
        .and_then(|v| v.as_string().map(|s| s.as_str().to_string()))
        .unwrap_or_default();
    Ok((obj, bytes, content_type))
}

/// Flatten constructor parts: strings, buffers, views, and other blobs.
fn collect_parts(cx: &mut NativeContext, parts: &Value) -> VmResult<Vec<u8>> {
    if parts.is_undefined() {
        return Ok(Vec::new());
    }
    let mut bytes = Vec::new();
    for part in cx.iterable_to_array(parts)? {
        match &part {
            Value::String(s) => bytes.extend_from_slice(s.as_str().as_bytes()),
            Value::ArrayBuffer(buffer) => {
                if let Some(data) = buffer.with_data(<[u8]>::to_vec) {
                    bytes.extend_from_slice(&data);
                }
            }
            Value::TypedArray(ta) => {
                if let Some(data) = ta.bytes() {
                    bytes.extend_from_slice(&data);
                }
            }
            other if other.is_object() && other.as_object().unwrap().has_internal_slot(DATA_SLOT) => {
                let (_, inner, _) = this_blob(other, "Blob part")?;
                bytes.extend_from_slice(&inner);
            }
            other => {
                let text = cx.to_string_value(other)?;
                bytes.extend_from_slice(text.as_str().as_bytes());
            }
        }
    }
    Ok(bytes)
}

fn blob_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor Blob requires 'new'"));
    }
    let bytes = collect_parts(cx, arg(args, 0))?;
    let content_type = match arg(args, 1) {
        Value::Undefined => String::new(),
        options => match cx.get(options, &PropertyKey::string("type"))? {
            Value::Undefined => String::new(),
            v => cx.to_string_value(&v)?.as_str().to_ascii_lowercase(),
        },
    };
    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::BLOB_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    obj.set_internal_slot(
        DATA_SLOT,
        Value::ArrayBuffer(JsArrayBuffer::from_bytes(bytes, None)),
    );
    obj.set_internal_slot(TYPE_SLOT, Value::string(content_type));
    Ok(Value::object(obj))
}

fn blob_size(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes, _) = this_blob(this, "get size")?;
    Ok(Value::number(bytes.len() as f64))
}

fn blob_type(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let (_, _, content_type) = this_blob(this, "get type")?;
    Ok(Value::string(content_type))
}

fn blob_slice(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes, content_type) = this_blob(this, "slice")?;
    let len = bytes.len();
    let start = paserati_vm_core::convert::relative_index(
        cx.to_number(arg(args, 0)).unwrap_or(0.0),
        len,
    );
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => paserati_vm_core::convert::relative_index(cx.to_number(other)?, len),
    };
    let slice_type = match arg(args, 2) {
        Value::Undefined => content_type,
        v => cx.to_string_value(v)?.as_str().to_ascii_lowercase(),
    };
    let slice = bytes
        .get(start..end.max(start))
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    Ok(new_blob_value(&cx.current_realm(), slice, &slice_type))
}

fn blob_text(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes, _) = this_blob(this, "text")?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    Ok(cx.new_resolved_promise(Value::string(text)))
}

fn blob_array_buffer(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes, _) = this_blob(this, "arrayBuffer")?;
    let proto = cx
        .current_realm()
        .intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
    let buffer = JsArrayBuffer::from_bytes(bytes, proto);
    Ok(cx.new_resolved_promise(Value::ArrayBuffer(buffer)))
}

fn blob_bytes_method(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes, _) = this_blob(this, "bytes")?;
    let realm = cx.current_realm();
    let proto = realm.intrinsic_object(&intrinsic_keys::typed_array_prototype("Uint8Array"));
    let buffer_proto = realm.intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
    let out = paserati_vm_core::typed_array::JsTypedArray::with_length(
        TypedArrayKind::Uint8,
        bytes.len(),
        proto,
        buffer_proto,
    );
    out.write_bytes(0, &bytes);
    Ok(cx.new_resolved_promise(Value::TypedArray(out)))
}
