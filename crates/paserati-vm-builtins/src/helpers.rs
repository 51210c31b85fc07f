//! Small shared helpers for builtin implementations.

use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::Realm;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

static UNDEFINED: Value = Value::Undefined;

/// Argument at `i`, or `undefined`.
pub fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&UNDEFINED)
}

/// Require a callable argument.
pub fn require_callable(value: &Value, what: &str) -> VmResult<Value> {
    if value.is_callable() {
        Ok(value.clone())
    } else {
        Err(VmError::type_error(format!("{what} is not a function")))
    }
}

/// Allocate an array value carrying the realm's `%Array.prototype%`.
pub fn new_array(realm: &Realm, items: Vec<Value>) -> Value {
    let arr = JsObject::alloc_array(0, realm.array_prototype());
    for item in items {
        arr.push_element(item);
    }
    Value::Array(arr)
}

/// Allocate a plain object carrying the realm's `%Object.prototype%`.
pub fn new_plain_object(realm: &Realm) -> GcRef<JsObject> {
    JsObject::alloc(Some(realm.object_prototype()))
}

/// Convert a value to a property key: symbols keep identity, canonical
/// numeric strings become indices, everything else goes through ToString.
pub fn to_property_key(cx: &mut NativeContext, value: &Value) -> VmResult<PropertyKey> {
    if let Some(sym) = value.as_symbol() {
        return Ok(PropertyKey::symbol(sym.clone()));
    }
    let s = cx.to_string_value(value)?;
    Ok(string_to_key(s.as_str()))
}

/// A string key, folded to an index when it is a canonical `u32`.
pub fn string_to_key(s: &str) -> PropertyKey {
    if let Ok(index) = s.parse::<u32>() {
        if index.to_string() == s {
            return PropertyKey::Index(index);
        }
    }
    PropertyKey::string(s)
}

