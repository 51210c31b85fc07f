//! The `Request` builtin: a normalized request record.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::RuntimeContext;
use crate::fetch::headers::{new_headers_object, pairs_from_value};
use crate::helpers::arg;

const BODY_SLOT: &str = "[[RequestBody]]";

/// RequestInit options observed by the transport layer.
const REDIRECT_MODES: [&str; 3] = ["follow", "error", "manual"];

pub(super) fn install(rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
    let realm = rcx.realm();
    // url/method/headers and the recorded RequestInit fields are own
    // non-enumerable data properties installed at construction.
    let (ctor, proto) = BuiltInBuilder::new(&realm, "Request")
        .constructor_fn(request_constructor, 1)
        .build_with_statics();

    rcx.set_intrinsic(intrinsic_keys::REQUEST_PROTOTYPE, Value::object(proto));
    rcx.define_global("Request", ctor);
    Ok(())
}

/// Everything `fetch` needs from `(input, init)`.
pub struct RequestRecord {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub signal: Option<GcRef<JsObject>>,
    pub redirect: String,
}

/// Normalize `(input, init)` into a request record. `input` may be a URL
/// string or a `Request` object; `init` fields override.
pub fn normalize(cx: &mut NativeContext, input: &Value, init: &Value) -> VmResult<RequestRecord> {
    let mut record = RequestRecord {
        url: String::new(),
        method: "GET".to_string(),
        headers: Vec::new(),
        body: None,
        signal: None,
        redirect: "follow".to_string(),
    };

    if let Some(obj) = input.as_object().filter(|o| o.has_own(&PropertyKey::string("url"))) {
        // A Request object: start from its recorded fields.
        record.url = read_string(cx, input, "url")?.unwrap_or_default();
        if let Some(method) = read_string(cx, input, "method")? {
            record.method = method;
        }
        if let Some(redirect) = read_string(cx, input, "redirect")? {
            record.redirect = redirect;
        }
        let headers = cx.get(input, &PropertyKey::string("headers"))?;
        record.headers = pairs_from_value(cx, &headers)?;
        if let Some(Value::ArrayBuffer(buffer)) = obj.internal_slot(BODY_SLOT) {
            record.body = buffer.with_data(<[u8]>::to_vec);
        }
        let signal = cx.get(input, &PropertyKey::string("signal"))?;
        record.signal = signal.as_object();
    } else {
        record.url = cx.to_string_value(input)?.as_str().to_string();
    }

    if record.url.is_empty() {
        return Err(VmError::type_error("Failed to parse URL from fetch input"));
    }
    url::Url::parse(&record.url)
        .map_err(|e| VmError::type_error(format!("Invalid URL {}: {e}", record.url)))?;

    if init.is_object() {
        if let Some(method) = read_string(cx, init, "method")? {
            record.method = method;
        }
        let headers = cx.get(init, &PropertyKey::string("headers"))?;
        if !headers.is_undefined() {
            record.headers = pairs_from_value(cx, &headers)?;
        }
        if let Some(redirect) = read_string(cx, init, "redirect")? {
            record.redirect = redirect;
        }
        let signal = cx.get(init, &PropertyKey::string("signal"))?;
        if !signal.is_nullish() {
            record.signal = signal.as_object();
        }
        let body = cx.get(init, &PropertyKey::string("body"))?;
        if !body.is_nullish() {
            record.body = Some(super::body_to_bytes(cx, &body, &mut record.headers)?);
        }
    }

    // Methods are upper-cased; redirect modes validated.
    record.method = record.method.to_ascii_uppercase();
    if !REDIRECT_MODES.contains(&record.redirect.as_str()) {
        return Err(VmError::type_error(format!(
            "Invalid redirect mode: {}",
            record.redirect
        )));
    }
    Ok(record)
}

fn read_string(cx: &mut NativeContext, target: &Value, key: &str) -> VmResult<Option<String>> {
    match cx.get(target, &PropertyKey::string(key))? {
        Value::Undefined => Ok(None),
        other => Ok(Some(cx.to_string_value(&other)?.as_str().to_string())),
    }
}

fn request_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor Request requires 'new'"));
    }
    let init = arg(args, 1).clone();
    let record = normalize(cx, arg(args, 0), &init)?;
    let realm = cx.current_realm();

    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::REQUEST_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    obj.set_own_non_enumerable(PropertyKey::string("url"), Value::string(record.url));
    obj.set_own_non_enumerable(PropertyKey::string("method"), Value::string(record.method));
    obj.set_own_non_enumerable(
        PropertyKey::string("headers"),
        new_headers_object(&realm, &record.headers),
    );
    obj.set_own_non_enumerable(
        PropertyKey::string("redirect"),
        Value::string(record.redirect),
    );
    obj.set_own_non_enumerable(
        PropertyKey::string("signal"),
        match &record.signal {
            Some(signal) => Value::object(signal.clone()),
            None => Value::Undefined,
        },
    );
    // The remaining RequestInit fields are recorded verbatim for
    // observation; the HTTP/1.1 transport does not act on them.
    for key in ["credentials", "cache", "mode", "referrer", "referrerPolicy"] {
        let value = if init.is_object() {
            cx.get(&init, &PropertyKey::string(key))?
        } else {
            Value::Undefined
        };
        let value = match value {
            Value::Undefined => Value::string(default_init_field(key)),
            other => Value::String(cx.to_string_value(&other)?),
        };
        obj.set_own_non_enumerable(PropertyKey::string(key), value);
    }
    if let Some(body) = record.body {
        obj.set_internal_slot(
            BODY_SLOT,
            Value::ArrayBuffer(paserati_vm_core::array_buffer::JsArrayBuffer::from_bytes(
                body, None,
            )),
        );
    }
    Ok(Value::object(obj))
}

fn default_init_field(key: &str) -> &'static str {
    match key {
        "credentials" => "same-origin",
        "cache" => "default",
        "mode" => "cors",
        "referrer" => "about:client",
        "referrerPolicy" => "",
        _ => "",
    }
}
