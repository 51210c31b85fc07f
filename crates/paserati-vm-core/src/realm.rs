//! Realms: independent global environments with per-realm intrinsics.
//!
//! Every realm owns its global object and a string-keyed slot table of
//! intrinsic objects (`"%ObjectPrototype%"`, `"%ErrorPrototype%"`, …).
//! Cross-realm construction resolves an instance's prototype through these
//! slots keyed off `new.target`'s realm, never by closing over the defining
//! realm.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use crate::gc::GcRef;
use crate::object::JsObject;
use crate::value::Value;

/// Unique realm identifier.
pub type RealmId = u32;

/// Well-known intrinsic slot keys.
pub mod intrinsic_keys {
    pub const OBJECT_PROTOTYPE: &str = "%ObjectPrototype%";
    pub const FUNCTION_PROTOTYPE: &str = "%FunctionPrototype%";
    pub const ITERATOR_PROTOTYPE: &str = "%IteratorPrototype%";
    pub const ARRAY_PROTOTYPE: &str = "%ArrayPrototype%";
    pub const ARRAY_ITERATOR_PROTOTYPE: &str = "%ArrayIteratorPrototype%";
    pub const STRING_PROTOTYPE: &str = "%StringPrototype%";
    pub const BOOLEAN_PROTOTYPE: &str = "%BooleanPrototype%";
    pub const SYMBOL_PROTOTYPE: &str = "%SymbolPrototype%";
    pub const ERROR_PROTOTYPE: &str = "%ErrorPrototype%";
    pub const ERROR_CONSTRUCTOR: &str = "%Error%";
    pub const MAP_PROTOTYPE: &str = "%MapPrototype%";
    pub const MAP_ITERATOR_PROTOTYPE: &str = "%MapIteratorPrototype%";
    pub const WEAK_MAP_PROTOTYPE: &str = "%WeakMapPrototype%";
    pub const ARRAY_BUFFER_PROTOTYPE: &str = "%ArrayBufferPrototype%";
    pub const SHARED_ARRAY_BUFFER_PROTOTYPE: &str = "%SharedArrayBufferPrototype%";
    pub const TYPED_ARRAY: &str = "%TypedArray%";
    pub const TYPED_ARRAY_PROTOTYPE: &str = "%TypedArrayPrototype%";
    pub const BLOB_PROTOTYPE: &str = "%BlobPrototype%";
    pub const HEADERS_PROTOTYPE: &str = "%HeadersPrototype%";
    pub const REQUEST_PROTOTYPE: &str = "%RequestPrototype%";
    pub const RESPONSE_PROTOTYPE: &str = "%ResponsePrototype%";
    pub const ABORT_SIGNAL_PROTOTYPE: &str = "%AbortSignalPrototype%";
    pub const ABORT_CONTROLLER_PROTOTYPE: &str = "%AbortControllerPrototype%";

    /// Slot key for a concrete typed-array prototype, e.g.
    /// `"%Int32ArrayPrototype%"`.
    pub fn typed_array_prototype(name: &str) -> String {
        format!("%{name}Prototype%")
    }
}

/// A realm record.
pub struct RealmData {
    pub id: RealmId,
    pub global: GcRef<JsObject>,
    slots: RwLock<FxHashMap<String, Value>>,
}

/// Shared realm handle.
pub type Realm = Arc<RealmData>;

impl RealmData {
    /// Create a realm with the core prototype skeleton pre-allocated:
    /// `%ObjectPrototype%` (chain end), `%FunctionPrototype%`, and the
    /// global object. Builtin initializers populate their properties later;
    /// allocating the bare objects first breaks the circular dependencies.
    pub fn new(id: RealmId) -> Realm {
        let object_prototype = JsObject::alloc(None);
        let function_prototype = JsObject::alloc(Some(object_prototype.clone()));
        let global = JsObject::alloc(Some(object_prototype.clone()));

        let realm = Arc::new(Self {
            id,
            global,
            slots: RwLock::new(FxHashMap::default()),
        });
        realm.set_intrinsic(
            intrinsic_keys::OBJECT_PROTOTYPE,
            Value::object(object_prototype),
        );
        realm.set_intrinsic(
            intrinsic_keys::FUNCTION_PROTOTYPE,
            Value::object(function_prototype),
        );
        realm
    }

    /// Read an intrinsic slot.
    pub fn intrinsic(&self, key: &str) -> Option<Value> {
        self.slots.read().get(key).cloned()
    }

    /// Read an intrinsic slot as an object handle.
    pub fn intrinsic_object(&self, key: &str) -> Option<GcRef<JsObject>> {
        self.intrinsic(key).and_then(|v| v.as_object())
    }

    /// Install an intrinsic slot; initializers call this as they build
    /// their prototypes.
    pub fn set_intrinsic(&self, key: impl Into<String>, value: Value) {
        self.slots.write().insert(key.into(), value);
    }

    pub fn object_prototype(&self) -> GcRef<JsObject> {
        self.intrinsic_object(intrinsic_keys::OBJECT_PROTOTYPE)
            .expect("realm bootstrap installs %ObjectPrototype%")
    }

    pub fn function_prototype(&self) -> GcRef<JsObject> {
        self.intrinsic_object(intrinsic_keys::FUNCTION_PROTOTYPE)
            .expect("realm bootstrap installs %FunctionPrototype%")
    }

    pub fn array_prototype(&self) -> Option<GcRef<JsObject>> {
        self.intrinsic_object(intrinsic_keys::ARRAY_PROTOTYPE)
    }
}

impl std::fmt::Debug for RealmData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("id", &self.id)
            .field("slots", &self.slots.read().len())
            .finish()
    }
}

/// Registry of realms created by a runtime.
pub struct RealmRegistry {
    realms: RwLock<Vec<Realm>>,
    next_id: AtomicU32,
}

impl RealmRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            realms: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        })
    }

    /// Allocate and register a fresh realm.
    pub fn create_realm(&self) -> Realm {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let realm = RealmData::new(id);
        self.realms.write().push(realm.clone());
        realm
    }

    pub fn get(&self, id: RealmId) -> Option<Realm> {
        self.realms.read().iter().find(|r| r.id == id).cloned()
    }

    /// Drop a realm's roots so its objects can be collected.
    pub fn remove(&self, id: RealmId) -> Option<Realm> {
        let mut realms = self.realms.write();
        realms
            .iter()
            .position(|r| r.id == id)
            .map(|pos| realms.swap_remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_skeleton() {
        let registry = RealmRegistry::new();
        let realm = registry.create_realm();

        let obj_proto = realm.object_prototype();
        let fn_proto = realm.function_prototype();
        assert!(obj_proto.prototype().is_none());
        assert!(GcRef::ptr_eq(&fn_proto.prototype().unwrap(), &obj_proto));
        assert!(GcRef::ptr_eq(
            &realm.global.prototype().unwrap(),
            &obj_proto
        ));
    }

    #[test]
    fn test_realms_are_independent() {
        let registry = RealmRegistry::new();
        let a = registry.create_realm();
        let b = registry.create_realm();
        assert_ne!(a.id, b.id);
        assert!(!GcRef::ptr_eq(&a.object_prototype(), &b.object_prototype()));
    }

    #[test]
    fn test_intrinsic_slots() {
        let registry = RealmRegistry::new();
        let realm = registry.create_realm();
        let proto = JsObject::alloc(Some(realm.object_prototype()));
        realm.set_intrinsic(intrinsic_keys::MAP_PROTOTYPE, Value::object(proto.clone()));
        assert!(GcRef::ptr_eq(
            &realm.intrinsic_object(intrinsic_keys::MAP_PROTOTYPE).unwrap(),
            &proto
        ));
        assert!(realm.intrinsic("%Missing%").is_none());
    }
}
