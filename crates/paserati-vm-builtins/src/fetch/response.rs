//! The `Response` builtin: status line, headers, and a single-use body.

use paserati_vm_core::array_buffer::JsArrayBuffer;
use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::typed_array::{JsTypedArray, TypedArrayKind};
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::RuntimeContext;
use crate::blob::new_blob_value;
use crate::fetch::headers::{new_headers_object, pairs_from_value};
use crate::helpers::arg;

const BODY_SLOT: &str = "[[ResponseBody]]";
const BODY_USED_SLOT: &str = "[[BodyUsed]]";
const TYPE_SLOT: &str = "[[ResponseType]]";

/// Everything needed to materialize a `Response` object on the VM thread.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub url: String,
    pub redirected: bool,
    pub response_type: String,
}

impl ResponseParts {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: status_text_for(status),
            headers: Vec::new(),
            body: Vec::new(),
            url: String::new(),
            redirected: false,
            response_type: "default".to_string(),
        }
    }
}

fn status_text_for(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
        .to_string()
}

pub(super) fn install(rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
    let realm = rcx.realm();

    // status/statusText/url/headers/redirected are installed as own
    // non-enumerable data properties at construction; the computed fields
    // are prototype accessors.
    let (ctor, proto) = BuiltInBuilder::new(&realm, "Response")
        .constructor_fn(response_constructor, 0)
        .accessor("ok", response_ok)
        .accessor("type", response_type)
        .accessor("bodyUsed", response_body_used)
        .method("text", response_text, 0)
        .method("json", response_json_method, 0)
        .method("arrayBuffer", response_array_buffer, 0)
        .method("bytes", response_bytes, 0)
        .method("blob", response_blob, 0)
        .static_method("error", response_error_factory, 0)
        .static_method("redirect", response_redirect_factory, 2)
        .static_method("json", response_json_factory, 1)
        .build_with_statics();

    rcx.set_intrinsic(intrinsic_keys::RESPONSE_PROTOTYPE, Value::object(proto));
    rcx.define_global("Response", ctor);
    Ok(())
}

/// Materialize a `Response` value in the current realm.
pub fn make_response(realm: &Realm, parts: ResponseParts) -> Value {
    let proto = realm.intrinsic_object(intrinsic_keys::RESPONSE_PROTOTYPE);
    let obj = JsObject::alloc(proto);

    obj.set_own_non_enumerable(PropertyKey::string("status"), Value::number(parts.status as f64));
    obj.set_own_non_enumerable(
        PropertyKey::string("statusText"),
        Value::string(parts.status_text.clone()),
    );
    obj.set_own_non_enumerable(PropertyKey::string("url"), Value::string(parts.url.clone()));
    obj.set_own_non_enumerable(
        PropertyKey::string("redirected"),
        Value::boolean(parts.redirected),
    );
    obj.set_internal_slot(TYPE_SLOT, Value::string(parts.response_type.clone()));
    obj.set_own_non_enumerable(
        PropertyKey::string("headers"),
        new_headers_object(realm, &parts.headers),
    );
    obj.set_internal_slot(
        BODY_SLOT,
        Value::ArrayBuffer(JsArrayBuffer::from_bytes(parts.body, None)),
    );
    obj.set_internal_slot(BODY_USED_SLOT, Value::boolean(false));
    Value::object(obj)
}

fn this_response(this: &Value, what: &str) -> VmResult<GcRef<JsObject>> {
    this.as_object()
        .filter(|o| o.has_internal_slot(BODY_SLOT))
        .ok_or_else(|| VmError::type_error(format!("{what} requires a Response receiver")))
}

/// Take the body for a consuming read. Single-use: the second taker gets a
/// rejected promise.
fn consume_body(cx: &mut NativeContext, this: &Value, what: &str) -> Result<Vec<u8>, Value> {
    let obj = match this_response(this, what) {
        Ok(obj) => obj,
        Err(e) => return Err(cx.new_rejected_promise(e.to_value())),
    };
    let used = obj
        .internal_slot(BODY_USED_SLOT)
        .is_some_and(|v| v.to_boolean());
    if used {
        return Err(cx.new_rejected_promise(Value::string("TypeError: body already used")));
    }
    obj.set_internal_slot(BODY_USED_SLOT, Value::boolean(true));
    let bytes = match obj.internal_slot(BODY_SLOT) {
        Some(Value::ArrayBuffer(buffer)) => buffer.with_data(<[u8]>::to_vec).unwrap_or_default(),
        _ => Vec::new(),
    };
    Ok(bytes)
}

fn content_type_of(cx: &mut NativeContext, this: &Value) -> String {
    let headers = cx
        .get(this, &PropertyKey::string("headers"))
        .unwrap_or(Value::Undefined);
    if headers.is_object() {
        if let Ok(get) = cx.get(&headers, &PropertyKey::string("get")) {
            if get.is_callable() {
                if let Ok(value) = cx.call(&get, &headers, &[Value::string("content-type")]) {
                    if let Some(s) = value.as_string() {
                        return s.as_str().to_string();
                    }
                }
            }
        }
    }
    String::new()
}

// ---------------------------------------------------------------------------
// Constructor and accessors
// ---------------------------------------------------------------------------

fn response_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor Response requires 'new'"));
    }
    let realm = cx.current_realm();
    let mut parts = ResponseParts::new(200);

    let body = arg(args, 0);
    if !body.is_nullish() {
        parts.body = super::body_to_bytes(cx, body, &mut parts.headers)?;
    }

    let init = arg(args, 1);
    if init.is_object() {
        let status = cx.get(init, &PropertyKey::string("status"))?;
        if !status.is_undefined() {
            let code = cx.to_number(&status)? as u16;
            if !(200..=599).contains(&code) {
                return Err(VmError::range_error("Response status must be in [200, 599]"));
            }
            parts.status = code;
            parts.status_text = status_text_for(code);
        }
        let status_text = cx.get(init, &PropertyKey::string("statusText"))?;
        if !status_text.is_undefined() {
            parts.status_text = cx.to_string_value(&status_text)?.as_str().to_string();
        }
        let headers = cx.get(init, &PropertyKey::string("headers"))?;
        if !headers.is_undefined() {
            let mut pairs = pairs_from_value(cx, &headers)?;
            // Explicit headers win over an inferred content type.
            parts.headers.retain(|(name, _)| {
                !pairs.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
            });
            parts.headers.append(&mut pairs);
        }
    }
    Ok(make_response(&realm, parts))
}

fn own_value(this: &Value, key: &str) -> Value {
    this.as_object()
        .and_then(|o| o.get_own(&PropertyKey::string(key)))
        .and_then(|d| d.data_value().cloned())
        .unwrap_or(Value::Undefined)
}

fn response_ok(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    this_response(this, "get ok")?;
    let status = own_value(this, "status").as_number().unwrap_or(0.0);
    Ok(Value::boolean((200.0..300.0).contains(&status)))
}

fn response_type(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let obj = this_response(this, "get type")?;
    Ok(obj.internal_slot(TYPE_SLOT).unwrap_or(Value::Undefined))
}

fn response_body_used(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let obj = this_response(this, "get bodyUsed")?;
    Ok(Value::boolean(
        obj.internal_slot(BODY_USED_SLOT)
            .is_some_and(|v| v.to_boolean()),
    ))
}

// ---------------------------------------------------------------------------
// Body readers (single-use)
// ---------------------------------------------------------------------------

fn response_text(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    match consume_body(cx, this, "text") {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            Ok(cx.new_resolved_promise(Value::string(text)))
        }
        Err(rejected) => Ok(rejected),
    }
}

fn response_json_method(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    match consume_body(cx, this, "json") {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let parsed: Result<serde_json::Value, _> = serde_json::from_str(&text);
            match parsed {
                Ok(json) => {
                    let value = crate::json::json_to_value(&cx.current_realm(), json);
                    Ok(cx.new_resolved_promise(value))
                }
                Err(e) => Ok(cx.new_rejected_promise(Value::string(format!(
                    "SyntaxError: Unexpected token in JSON: {e}"
                )))),
            }
        }
        Err(rejected) => Ok(rejected),
    }
}

fn response_array_buffer(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    match consume_body(cx, this, "arrayBuffer") {
        Ok(bytes) => {
            let proto = cx
                .current_realm()
                .intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
            Ok(cx.new_resolved_promise(Value::ArrayBuffer(JsArrayBuffer::from_bytes(
                bytes, proto,
            ))))
        }
        Err(rejected) => Ok(rejected),
    }
}

fn response_bytes(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    match consume_body(cx, this, "bytes") {
        Ok(bytes) => {
            let realm = cx.current_realm();
            let proto =
                realm.intrinsic_object(&intrinsic_keys::typed_array_prototype("Uint8Array"));
            let buffer_proto = realm.intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
            let out =
                JsTypedArray::with_length(TypedArrayKind::Uint8, bytes.len(), proto, buffer_proto);
            out.write_bytes(0, &bytes);
            Ok(cx.new_resolved_promise(Value::TypedArray(out)))
        }
        Err(rejected) => Ok(rejected),
    }
}

fn response_blob(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let content_type = content_type_of(cx, this);
    match consume_body(cx, this, "blob") {
        Ok(bytes) => {
            let blob = new_blob_value(&cx.current_realm(), bytes, &content_type);
            Ok(cx.new_resolved_promise(blob))
        }
        Err(rejected) => Ok(rejected),
    }
}

// ---------------------------------------------------------------------------
// Static factories
// ---------------------------------------------------------------------------

fn response_error_factory(_this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let mut parts = ResponseParts::new(200);
    parts.status = 0;
    parts.status_text = String::new();
    parts.response_type = "error".to_string();
    Ok(make_response(&cx.current_realm(), parts))
}

fn response_redirect_factory(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
) -> VmResult<Value> {
    let url = cx.to_string_value(arg(args, 0))?;
    let status = match arg(args, 1) {
        Value::Undefined => 302,
        other => cx.to_number(other)? as u16,
    };
    if !matches!(status, 301 | 302 | 303 | 307 | 308) {
        return Err(VmError::range_error("Invalid redirect status code"));
    }
    let mut parts = ResponseParts::new(status);
    parts
        .headers
        .push(("location".to_string(), url.as_str().to_string()));
    Ok(make_response(&cx.current_realm(), parts))
}

fn response_json_factory(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let serialized = crate::json::stringify_value(cx, arg(args, 0))?
        .ok_or_else(|| VmError::type_error("Response.json data is not serializable"))?;

    let mut parts = ResponseParts::new(200);
    parts.body = serialized.into_bytes();
    parts.headers.push((
        "content-type".to_string(),
        "application/json".to_string(),
    ));

    let init = arg(args, 1);
    if init.is_object() {
        let status = cx.get(init, &PropertyKey::string("status"))?;
        if !status.is_undefined() {
            let code = cx.to_number(&status)? as u16;
            parts.status = code;
            parts.status_text = status_text_for(code);
        }
    }
    Ok(make_response(&cx.current_realm(), parts))
}
