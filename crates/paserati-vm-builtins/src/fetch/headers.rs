//! The `Headers` builtin: a case-insensitive, insertion-ordered header
//! multimap.
//!
//! Names are normalized to lowercase; the backing store is the same
//! tombstone entry array `Map` uses, so iteration order is insertion order.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert::MapKey;
use paserati_vm_core::map_data::JsMap;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::RuntimeContext;
use crate::helpers::{arg, new_array, require_callable};
use crate::iterator::{IterationKind, new_index_iterator};

const HEADERS_SLOT: &str = "[[HeadersList]]";

pub(super) fn install(rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
    let realm = rcx.realm();
    let iterator_sym = well_known_symbols().iterator.clone();

    let (ctor, proto) = BuiltInBuilder::new(&realm, "Headers")
        .constructor_fn(headers_constructor, 0)
        .method("append", headers_append, 2)
        .method("get", headers_get, 1)
        .method("set", headers_set, 2)
        .method("has", headers_has, 1)
        .method("delete", headers_delete, 1)
        .method("forEach", headers_for_each, 1)
        .method("keys", |this, _a, cx| headers_iter(this, cx, IterationKind::Keys), 0)
        .method("values", |this, _a, cx| headers_iter(this, cx, IterationKind::Values), 0)
        .method("entries", |this, _a, cx| headers_iter(this, cx, IterationKind::Entries), 0)
        .symbol_method(iterator_sym, "Symbol.iterator", |this, _a, cx| {
            headers_iter(this, cx, IterationKind::Entries)
        }, 0)
        .build_with_statics();

    rcx.set_intrinsic(intrinsic_keys::HEADERS_PROTOTYPE, Value::object(proto));
    rcx.define_global("Headers", ctor);
    Ok(())
}

/// Build a Headers object from native pairs (fetch responses).
pub fn new_headers_object(realm: &Realm, pairs: &[(String, String)]) -> Value {
    let proto = realm.intrinsic_object(intrinsic_keys::HEADERS_PROTOTYPE);
    let obj = JsObject::alloc(proto);
    let map = JsMap::new(None);
    for (name, value) in pairs {
        append_pair(&map, name, value);
    }
    obj.set_internal_slot(HEADERS_SLOT, Value::Map(map));
    Value::object(obj)
}

/// Extract header pairs from a Headers object, a plain object, or an array
/// of `[name, value]` pairs.
pub fn pairs_from_value(cx: &mut NativeContext, value: &Value) -> VmResult<Vec<(String, String)>> {
    if value.is_nullish() {
        return Ok(Vec::new());
    }
    // An existing Headers object.
    if let Some(map) = headers_map_of(value) {
        return Ok(snapshot(&map));
    }
    // An array of pairs.
    if value.is_array() {
        let mut pairs = Vec::new();
        for entry in cx.iterable_to_array(value)? {
            let pair = cx.iterable_to_array(&entry)?;
            if pair.len() != 2 {
                return Err(VmError::type_error("Header entry must be a [name, value] pair"));
            }
            let name = cx.to_string_value(&pair[0])?;
            let val = cx.to_string_value(&pair[1])?;
            pairs.push((normalize_name(name.as_str())?, val.as_str().trim().to_string()));
        }
        return Ok(pairs);
    }
    // A plain record.
    let Some(obj) = value.as_object() else {
        return Err(VmError::type_error("Headers init must be an object"));
    };
    let mut pairs = Vec::new();
    for key in obj.enumerable_string_keys() {
        let raw = cx.get(value, &key)?;
        let val = cx.to_string_value(&raw)?;
        pairs.push((
            normalize_name(&key.display())?,
            val.as_str().trim().to_string(),
        ));
    }
    Ok(pairs)
}

fn normalize_name(name: &str) -> VmResult<String> {
    if name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
    {
        return Err(VmError::type_error(format!("Invalid header name: {name}")));
    }
    Ok(name.to_ascii_lowercase())
}

fn headers_map_of(value: &Value) -> Option<GcRef<JsMap>> {
    let obj = value.as_object()?;
    match obj.internal_slot(HEADERS_SLOT) {
        Some(Value::Map(map)) => Some(map),
        _ => None,
    }
}

fn this_headers(this: &Value, what: &str) -> VmResult<GcRef<JsMap>> {
    headers_map_of(this)
        .ok_or_else(|| VmError::type_error(format!("{what} requires a Headers receiver")))
}

fn append_pair(map: &GcRef<JsMap>, name: &str, value: &str) {
    let key = MapKey::new(Value::string(name.to_ascii_lowercase()));
    // Repeated names combine into one comma-separated value.
    let combined = match map.data.get(&key) {
        Some(existing) => match existing.as_string() {
            Some(prev) => format!("{prev}, {value}"),
            None => value.to_string(),
        },
        None => value.to_string(),
    };
    map.data.set(key, Value::string(combined));
}

fn snapshot(map: &GcRef<JsMap>) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(map.data.size());
    for position in 0..map.data.entries_len() {
        if let Some((name, value)) = map.data.entry_at(position) {
            let name = name.as_string().map(|s| s.as_str().to_string());
            let value = value.as_string().map(|s| s.as_str().to_string());
            if let (Some(name), Some(value)) = (name, value) {
                out.push((name, value));
            }
        }
    }
    out
}

fn headers_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor Headers requires 'new'"));
    }
    let pairs = pairs_from_value(cx, arg(args, 0))?;
    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::HEADERS_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    let map = JsMap::new(None);
    for (name, value) in &pairs {
        append_pair(&map, name, value);
    }
    obj.set_internal_slot(HEADERS_SLOT, Value::Map(map));
    Ok(Value::object(obj))
}

fn headers_append(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.append")?;
    let name = normalize_name(cx.to_string_value(arg(args, 0))?.as_str())?;
    let value = cx.to_string_value(arg(args, 1))?;
    append_pair(&map, &name, value.as_str().trim());
    Ok(Value::Undefined)
}

fn headers_get(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.get")?;
    let name = normalize_name(cx.to_string_value(arg(args, 0))?.as_str())?;
    Ok(map
        .data
        .get(&MapKey::new(Value::string(name)))
        .unwrap_or(Value::Null))
}

fn headers_set(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.set")?;
    let name = normalize_name(cx.to_string_value(arg(args, 0))?.as_str())?;
    let value = cx.to_string_value(arg(args, 1))?;
    map.data.set(
        MapKey::new(Value::string(name)),
        Value::string(value.as_str().trim()),
    );
    Ok(Value::Undefined)
}

fn headers_has(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.has")?;
    let name = normalize_name(cx.to_string_value(arg(args, 0))?.as_str())?;
    Ok(Value::boolean(
        map.data.has(&MapKey::new(Value::string(name))),
    ))
}

fn headers_delete(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.delete")?;
    let name = normalize_name(cx.to_string_value(arg(args, 0))?.as_str())?;
    map.data.delete(&MapKey::new(Value::string(name)));
    Ok(Value::Undefined)
}

fn headers_for_each(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_headers(this, "Headers.prototype.forEach")?;
    let callback = require_callable(arg(args, 0), "Headers.prototype.forEach callback")?;
    let this_arg = arg(args, 1).clone();
    for (name, value) in snapshot(&map) {
        cx.call(
            &callback,
            &this_arg,
            &[Value::string(value), Value::string(name), this.clone()],
        )?;
    }
    Ok(Value::Undefined)
}

fn headers_iter(this: &Value, cx: &mut NativeContext, kind: IterationKind) -> VmResult<Value> {
    let map = this_headers(this, "Headers iterator")?;
    let realm = cx.current_realm();
    let items: Vec<Value> = snapshot(&map)
        .into_iter()
        .map(|(name, value)| match kind {
            IterationKind::Keys => Value::string(name),
            IterationKind::Values => Value::string(value),
            IterationKind::Entries => {
                new_array(&realm, vec![Value::string(name), Value::string(value)])
            }
        })
        .collect();
    new_index_iterator(&realm, new_array(&realm, items), IterationKind::Values)
}
