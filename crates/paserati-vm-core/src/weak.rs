//! Weakly-keyed storage for `WeakMap`.
//!
//! Keys are held through non-rooting handles; an entry disappears once the
//! key loses its last strong reference. There is no iteration surface, so
//! dead entries are simply pruned whenever the table is touched.

use parking_lot::RwLock;

use crate::error::{VmError, VmResult};
use crate::gc::{GcRef, WeakRef};
use crate::object::JsObject;
use crate::symbol::JsSymbol;
use crate::symbol_registry::global_symbol_registry;
use crate::value::Value;

/// A key held weakly: an object or a unique (unregistered) symbol.
pub enum WeakKey {
    Object(WeakRef<JsObject>),
    Symbol(WeakRef<JsSymbol>),
}

impl WeakKey {
    /// Validate and downgrade a candidate key.
    ///
    /// Registry-registered symbols are process-rooted and would never be
    /// collected, so they are rejected along with primitives.
    pub fn try_from_value(value: &Value) -> VmResult<WeakKey> {
        if let Some(obj) = value.as_object() {
            return Ok(WeakKey::Object(obj.downgrade()));
        }
        if let Some(sym) = value.as_symbol() {
            if global_symbol_registry().key_for(sym).is_some() {
                return Err(VmError::type_error(
                    "Registered symbols cannot be held weakly",
                ));
            }
            return Ok(WeakKey::Symbol(sym.downgrade()));
        }
        Err(VmError::type_error("Invalid value used as weak map key"))
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            WeakKey::Object(weak) => value.as_object().is_some_and(|obj| weak.refers_to(&obj)),
            WeakKey::Symbol(weak) => match value.as_symbol() {
                Some(sym) => weak.upgrade().is_some_and(|live| live.id == sym.id),
                None => false,
            },
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            WeakKey::Object(weak) => weak.is_dead(),
            WeakKey::Symbol(weak) => weak.is_dead(),
        }
    }
}

/// Internal storage for a JavaScript `WeakMap`.
#[derive(Default)]
pub struct WeakMapData {
    entries: RwLock<Vec<(WeakKey, Value)>>,
}

impl WeakMapData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.prune();
        let entries = self.entries.read();
        entries
            .iter()
            .find(|(k, _)| k.matches(key))
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &Value) -> bool {
        self.prune();
        self.entries.read().iter().any(|(k, _)| k.matches(key))
    }

    /// Insert or update; the key must already be validated as weakly
    /// holdable.
    pub fn set(&self, key: WeakKey, key_value: &Value, value: Value) {
        self.prune();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|(k, _)| k.matches(key_value)) {
            entry.1 = value;
        } else {
            entries.push((key, value));
        }
    }

    pub fn delete(&self, key: &Value) -> bool {
        self.prune();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(k, _)| !k.matches(key));
        entries.len() != before
    }

    /// Live entry count; test-only observability, not part of the WeakMap
    /// surface.
    pub fn live_len(&self) -> usize {
        self.prune();
        self.entries.read().len()
    }

    fn prune(&self) {
        let mut entries = self.entries.write();
        entries.retain(|(k, _)| !k.is_dead());
    }
}

impl std::fmt::Debug for WeakMapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeakMapData")
    }
}

/// A `WeakMap` value.
#[derive(Debug)]
pub struct JsWeakMap {
    pub object: GcRef<JsObject>,
    pub data: WeakMapData,
}

impl JsWeakMap {
    pub fn new(prototype: Option<GcRef<JsObject>>) -> GcRef<JsWeakMap> {
        GcRef::new(JsWeakMap {
            object: JsObject::alloc(prototype),
            data: WeakMapData::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_roundtrip() {
        let data = WeakMapData::new();
        let key_obj = JsObject::alloc(None);
        let key = Value::object(key_obj.clone());
        data.set(
            WeakKey::try_from_value(&key).unwrap(),
            &key,
            Value::int32(42),
        );
        assert!(data.has(&key));
        assert_eq!(data.get(&key).unwrap().as_int32(), Some(42));
        assert!(data.delete(&key));
        assert!(!data.has(&key));
    }

    #[test]
    fn test_entry_vanishes_when_key_dies() {
        let data = WeakMapData::new();
        let key_obj = JsObject::alloc(None);
        let key = Value::object(key_obj.clone());
        data.set(
            WeakKey::try_from_value(&key).unwrap(),
            &key,
            Value::int32(1),
        );
        assert_eq!(data.live_len(), 1);

        drop(key);
        drop(key_obj);
        assert_eq!(data.live_len(), 0);
    }

    #[test]
    fn test_primitive_key_rejected() {
        assert!(WeakKey::try_from_value(&Value::int32(1)).is_err());
        assert!(WeakKey::try_from_value(&Value::string("x")).is_err());
    }

    #[test]
    fn test_unique_symbol_key_allowed() {
        let sym = JsSymbol::new(None);
        let key = Value::symbol(sym.clone());
        assert!(WeakKey::try_from_value(&key).is_ok());
    }
}
