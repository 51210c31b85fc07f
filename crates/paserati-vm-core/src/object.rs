//! The object model: property keys, descriptors, and prototype-chained
//! objects.
//!
//! Own properties live in an insertion-ordered table. Objects start in
//! `Plain` shape mode; unbounded or delete-heavy key churn demotes them to
//! `Dictionary` mode. The distinction is a storage hint only: every
//! observable contract (descriptor semantics, enumeration order, prototype
//! walks) is identical in both modes.

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::error::{VmError, VmResult};
use crate::gc::GcRef;
use crate::string::JsString;
use crate::symbol::JsSymbol;
use crate::value::Value;

/// Distinct own-key count at which a plain object converts to dictionary
/// mode.
const DICTIONARY_THRESHOLD: usize = 32;

/// Property key: a string, a symbol, or an array index.
#[derive(Clone, Debug)]
pub enum PropertyKey {
    String(JsString),
    Symbol(GcRef<JsSymbol>),
    Index(u32),
}

impl PropertyKey {
    pub fn string(s: &str) -> Self {
        Self::String(JsString::intern(s))
    }

    pub fn index(i: u32) -> Self {
        Self::Index(i)
    }

    pub fn symbol(sym: GcRef<JsSymbol>) -> Self {
        Self::Symbol(sym)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Self::Symbol(_))
    }

    /// Render for error messages and `ownKeys` ordering decisions.
    pub fn display(&self) -> String {
        match self {
            Self::String(s) => s.as_str().to_string(),
            Self::Symbol(s) => s.to_string(),
            Self::Index(i) => i.to_string(),
        }
    }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            // Symbols compare by identity, which is their id.
            (Self::Symbol(a), Self::Symbol(b)) => a.id == b.id,
            (Self::Index(a), Self::Index(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyKey {}

impl std::hash::Hash for PropertyKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Self::Symbol(sym) => {
                1u8.hash(state);
                sym.id.hash(state);
            }
            Self::Index(i) => {
                2u8.hash(state);
                i.hash(state);
            }
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        Self::string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        Self::Index(i)
    }
}

/// Property attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyAttributes {
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyAttributes {
    /// Default for the convenience "own" path: all true.
    pub const fn data() -> Self {
        Self {
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// Builtin method attributes: writable, non-enumerable, configurable.
    pub const fn builtin_method() -> Self {
        Self {
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Builtin accessor attributes: non-enumerable, configurable.
    pub const fn builtin_accessor() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// `length`/`name` on function objects: non-writable, non-enumerable,
    /// configurable.
    pub const fn function_length() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: true,
        }
    }

    /// `prototype.constructor` back-link.
    pub const fn constructor_link() -> Self {
        Self {
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    /// Fully locked down, e.g. `BYTES_PER_ELEMENT`.
    pub const fn frozen() -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
        }
    }
}

impl Default for PropertyAttributes {
    fn default() -> Self {
        Self::data()
    }
}

/// Property descriptor: data or accessor.
#[derive(Clone, Debug)]
pub enum PropertyDescriptor {
    Data {
        value: Value,
        attributes: PropertyAttributes,
    },
    Accessor {
        get: Option<Value>,
        set: Option<Value>,
        attributes: PropertyAttributes,
    },
}

impl PropertyDescriptor {
    pub fn data(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::data(),
        }
    }

    pub fn data_with_attrs(value: Value, attributes: PropertyAttributes) -> Self {
        Self::Data { value, attributes }
    }

    pub fn builtin_method(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::builtin_method(),
        }
    }

    pub fn function_length(value: Value) -> Self {
        Self::Data {
            value,
            attributes: PropertyAttributes::function_length(),
        }
    }

    pub fn accessor(get: Option<Value>, set: Option<Value>, attributes: PropertyAttributes) -> Self {
        Self::Accessor {
            get,
            set,
            attributes,
        }
    }

    pub fn attributes(&self) -> PropertyAttributes {
        match self {
            Self::Data { attributes, .. } | Self::Accessor { attributes, .. } => *attributes,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor { .. })
    }

    pub fn data_value(&self) -> Option<&Value> {
        match self {
            Self::Data { value, .. } => Some(value),
            Self::Accessor { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<&Value> {
        match self {
            Self::Accessor { get, .. } => get.as_ref(),
            Self::Data { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<&Value> {
        match self {
            Self::Accessor { set, .. } => set.as_ref(),
            Self::Data { .. } => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        match self {
            Self::Data { attributes, .. } => attributes.writable,
            Self::Accessor { .. } => false,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        self.attributes().enumerable
    }

    pub fn is_configurable(&self) -> bool {
        self.attributes().configurable
    }
}

/// Storage-layout hint; promotion never changes observable semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeMode {
    Plain,
    Dictionary,
}

const SHAPE_PLAIN: u8 = 0;
const SHAPE_DICTIONARY: u8 = 1;

type PropertyTable = IndexMap<PropertyKey, PropertyDescriptor, FxBuildHasher>;

/// A JavaScript object.
///
/// Thread-safe through interior locking: workers may construct fresh objects
/// off the VM thread as long as they only publish them through promise
/// settlement.
pub struct JsObject {
    /// Insertion-ordered own properties.
    properties: RwLock<PropertyTable>,
    /// `[[Prototype]]`; `None` for the end of the chain.
    prototype: RwLock<Option<GcRef<JsObject>>>,
    /// Dense element storage for array-like objects. Holes are `Value::Hole`.
    elements: RwLock<Vec<Value>>,
    /// Internal slots, keyed by bracketed names (`[[PrimitiveValue]]`, …).
    internal: RwLock<FxHashMap<&'static str, Value>>,
    extensible: AtomicBool,
    shape_mode: AtomicU8,
}

impl JsObject {
    /// Create an empty object with the given `[[Prototype]]`.
    pub fn new(prototype: Option<GcRef<JsObject>>) -> Self {
        Self {
            properties: RwLock::new(IndexMap::default()),
            prototype: RwLock::new(prototype),
            elements: RwLock::new(Vec::new()),
            internal: RwLock::new(FxHashMap::default()),
            extensible: AtomicBool::new(true),
            shape_mode: AtomicU8::new(SHAPE_PLAIN),
        }
    }

    /// Allocate on the managed heap.
    pub fn alloc(prototype: Option<GcRef<JsObject>>) -> GcRef<JsObject> {
        GcRef::new(Self::new(prototype))
    }

    /// Allocate an array object with `length` undefined elements.
    pub fn alloc_array(length: usize, prototype: Option<GcRef<JsObject>>) -> GcRef<JsObject> {
        let obj = Self::new(prototype);
        obj.elements.write().resize(length, Value::Undefined);
        GcRef::new(obj)
    }

    // ------------------------------------------------------------------
    // Prototype
    // ------------------------------------------------------------------

    pub fn prototype(&self) -> Option<GcRef<JsObject>> {
        self.prototype.read().clone()
    }

    /// `[[SetPrototypeOf]]`: fails on non-extensible objects and on chains
    /// that would become cyclic.
    pub fn set_prototype(
        self_ref: &GcRef<JsObject>,
        proto: Option<GcRef<JsObject>>,
    ) -> VmResult<()> {
        if !self_ref.is_extensible() {
            return Err(VmError::type_error(
                "Cannot set prototype of a non-extensible object",
            ));
        }
        let mut cursor = proto.clone();
        while let Some(obj) = cursor {
            if GcRef::ptr_eq(&obj, self_ref) {
                return Err(VmError::type_error(
                    "Cyclic prototype chain is not allowed",
                ));
            }
            cursor = obj.prototype();
        }
        *self_ref.prototype.write() = proto;
        Ok(())
    }

    /// Unchecked prototype installation, for realm bootstrap where the chain
    /// is known acyclic.
    pub fn set_prototype_unchecked(&self, proto: Option<GcRef<JsObject>>) {
        *self.prototype.write() = proto;
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible.load(Ordering::Relaxed)
    }

    pub fn prevent_extensions(&self) {
        self.extensible.store(false, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Own properties
    // ------------------------------------------------------------------

    /// Descriptor of an own property, consulting only this object.
    pub fn get_own(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.properties.read().get(key) {
            return Some(desc.clone());
        }
        if let PropertyKey::Index(i) = key {
            let elements = self.elements.read();
            if let Some(value) = elements.get(*i as usize) {
                if !value.is_hole() {
                    return Some(PropertyDescriptor::data(value.clone()));
                }
            }
        }
        None
    }

    /// Walk the prototype chain for the first object owning `key`, returning
    /// the descriptor. Getter invocation is the caller's job so that `this`
    /// can be bound to the original receiver.
    pub fn find_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(desc) = self.get_own(key) {
            return Some(desc);
        }
        let mut cursor = self.prototype();
        while let Some(obj) = cursor {
            if let Some(desc) = obj.get_own(key) {
                return Some(desc);
            }
            cursor = obj.prototype();
        }
        None
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        if self.properties.read().contains_key(key) {
            return true;
        }
        if let PropertyKey::Index(i) = key {
            let elements = self.elements.read();
            return elements
                .get(*i as usize)
                .is_some_and(|v| !v.is_hole());
        }
        false
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        if self.has_own(key) {
            return true;
        }
        let mut cursor = self.prototype();
        while let Some(obj) = cursor {
            if obj.has_own(key) {
                return true;
            }
            cursor = obj.prototype();
        }
        false
    }

    /// Install a data property `{value, writable, enumerable, configurable}`
    /// all true. Setter dispatch on inherited accessors is handled at the
    /// context layer, which knows the receiver.
    pub fn set_own(&self, key: PropertyKey, value: Value) {
        if let PropertyKey::Index(i) = &key {
            let mut elements = self.elements.write();
            let idx = *i as usize;
            if idx < elements.len() {
                elements[idx] = value;
                return;
            }
            // Dense append stays in element storage; anything sparse falls
            // through to the property table.
            if idx == elements.len() {
                elements.push(value);
                return;
            }
        }
        self.insert_property(key, PropertyDescriptor::data(value));
    }

    /// As [`set_own`](Self::set_own) but non-enumerable.
    pub fn set_own_non_enumerable(&self, key: PropertyKey, value: Value) {
        self.insert_property(
            key,
            PropertyDescriptor::data_with_attrs(
                value,
                PropertyAttributes {
                    writable: true,
                    enumerable: false,
                    configurable: true,
                },
            ),
        );
    }

    /// `[[DefineOwnProperty]]` with validation: redefining a
    /// non-configurable property fails with TypeError when the new
    /// descriptor widens it.
    pub fn define_own_property(&self, key: PropertyKey, desc: PropertyDescriptor) -> VmResult<()> {
        {
            let properties = self.properties.read();
            if let Some(existing) = properties.get(&key) {
                validate_redefinition(&key, existing, &desc)?;
            } else if !self.is_extensible() {
                return Err(VmError::type_error(format!(
                    "Cannot define property {} on a non-extensible object",
                    key.display()
                )));
            }
        }
        self.insert_property(key, desc);
        Ok(())
    }

    /// Install a descriptor without redefinition validation. For internal
    /// attribute tightening (`Object.freeze`) where the validated path
    /// would reject its own second pass.
    pub fn define_own_property_unchecked(&self, key: PropertyKey, desc: PropertyDescriptor) {
        self.insert_property(key, desc);
    }

    /// Install an accessor descriptor.
    pub fn define_accessor(
        &self,
        key: PropertyKey,
        get: Option<Value>,
        set: Option<Value>,
        attributes: PropertyAttributes,
    ) -> VmResult<()> {
        self.define_own_property(key, PropertyDescriptor::accessor(get, set, attributes))
    }

    /// `[[Delete]]`: fails on non-configurable properties.
    pub fn delete(&self, key: &PropertyKey) -> VmResult<bool> {
        {
            let properties = self.properties.read();
            if let Some(desc) = properties.get(key) {
                if !desc.is_configurable() {
                    return Err(VmError::type_error(format!(
                        "Cannot delete non-configurable property {}",
                        key.display()
                    )));
                }
            }
        }
        if let PropertyKey::Index(i) = key {
            let mut elements = self.elements.write();
            let idx = *i as usize;
            if idx < elements.len() {
                elements[idx] = Value::Hole;
                return Ok(true);
            }
        }
        let removed = self.properties.write().shift_remove(key).is_some();
        if removed {
            // Deletion churn is the classic dictionary-mode trigger.
            self.shape_mode.store(SHAPE_DICTIONARY, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Own keys: element indices ascending, then string keys in insertion
    /// order, then symbol keys in insertion order.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        {
            let elements = self.elements.read();
            for (i, value) in elements.iter().enumerate() {
                if !value.is_hole() {
                    keys.push(PropertyKey::Index(i as u32));
                }
            }
        }
        let properties = self.properties.read();
        for key in properties.keys() {
            if !key.is_symbol() {
                keys.push(key.clone());
            }
        }
        for key in properties.keys() {
            if key.is_symbol() {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Enumerable own string keys, for `for..in`-style listing and JSON.
    pub fn enumerable_string_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        {
            let elements = self.elements.read();
            for (i, value) in elements.iter().enumerate() {
                if !value.is_hole() {
                    keys.push(PropertyKey::Index(i as u32));
                }
            }
        }
        let properties = self.properties.read();
        for (key, desc) in properties.iter() {
            if !key.is_symbol() && desc.is_enumerable() {
                keys.push(key.clone());
            }
        }
        keys
    }

    pub fn shape_mode(&self) -> ShapeMode {
        match self.shape_mode.load(Ordering::Relaxed) {
            SHAPE_DICTIONARY => ShapeMode::Dictionary,
            _ => ShapeMode::Plain,
        }
    }

    fn insert_property(&self, key: PropertyKey, desc: PropertyDescriptor) {
        let mut properties = self.properties.write();
        properties.insert(key, desc);
        if properties.len() > DICTIONARY_THRESHOLD {
            self.shape_mode.store(SHAPE_DICTIONARY, Ordering::Relaxed);
        }
    }

    // ------------------------------------------------------------------
    // Element storage
    // ------------------------------------------------------------------

    /// Raw element read; holes come back as `None`.
    pub fn element(&self, index: usize) -> Option<Value> {
        let elements = self.elements.read();
        elements.get(index).and_then(|v| {
            if v.is_hole() {
                None
            } else {
                Some(v.clone())
            }
        })
    }

    /// Element write, growing with holes as needed.
    pub fn set_element(&self, index: usize, value: Value) {
        let mut elements = self.elements.write();
        if index >= elements.len() {
            elements.resize(index + 1, Value::Hole);
        }
        elements[index] = value;
    }

    pub fn elements_len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn set_elements_len(&self, len: usize) {
        self.elements.write().resize(len, Value::Hole);
    }

    pub fn push_element(&self, value: Value) {
        self.elements.write().push(value);
    }

    pub fn pop_element(&self) -> Option<Value> {
        self.elements.write().pop()
    }

    /// Snapshot of the live elements (holes as `undefined`).
    pub fn elements_snapshot(&self) -> Vec<Value> {
        self.elements
            .read()
            .iter()
            .map(|v| {
                if v.is_hole() {
                    Value::Undefined
                } else {
                    v.clone()
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Internal slots
    // ------------------------------------------------------------------

    pub fn internal_slot(&self, name: &str) -> Option<Value> {
        self.internal.read().get(name).cloned()
    }

    pub fn set_internal_slot(&self, name: &'static str, value: Value) {
        self.internal.write().insert(name, value);
    }

    pub fn has_internal_slot(&self, name: &str) -> bool {
        self.internal.read().contains_key(name)
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("properties", &self.properties.read().len())
            .field("elements", &self.elements.read().len())
            .field("mode", &self.shape_mode())
            .finish()
    }
}

fn validate_redefinition(
    key: &PropertyKey,
    existing: &PropertyDescriptor,
    incoming: &PropertyDescriptor,
) -> VmResult<()> {
    if existing.is_configurable() {
        return Ok(());
    }
    let reject = |detail: &str| {
        Err(VmError::type_error(format!(
            "Cannot redefine property {}: {detail}",
            key.display()
        )))
    };
    if incoming.is_configurable() {
        return reject("property is non-configurable");
    }
    if incoming.is_enumerable() != existing.is_enumerable() {
        return reject("cannot change enumerability");
    }
    match (existing, incoming) {
        (
            PropertyDescriptor::Data {
                value: old_value,
                attributes: old_attrs,
            },
            PropertyDescriptor::Data {
                value: new_value,
                attributes: new_attrs,
            },
        ) => {
            if !old_attrs.writable {
                if new_attrs.writable {
                    return reject("cannot make non-writable property writable");
                }
                if !crate::convert::same_value(old_value, new_value) {
                    return reject("cannot change the value of a non-writable property");
                }
            }
            Ok(())
        }
        (
            PropertyDescriptor::Accessor {
                get: old_get,
                set: old_set,
                ..
            },
            PropertyDescriptor::Accessor {
                get: new_get,
                set: new_set,
                ..
            },
        ) => {
            let same_fn = |a: &Option<Value>, b: &Option<Value>| match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => crate::convert::same_value(x, y),
                _ => false,
            };
            if !same_fn(old_get, new_get) || !same_fn(old_set, new_set) {
                return reject("cannot change accessor of a non-configurable property");
            }
            Ok(())
        }
        _ => reject("cannot convert between data and accessor property"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_own() {
        let obj = JsObject::new(None);
        obj.set_own(PropertyKey::string("foo"), Value::int32(42));
        let desc = obj.get_own(&PropertyKey::string("foo")).unwrap();
        assert_eq!(desc.data_value().unwrap().as_int32(), Some(42));
        assert!(desc.is_enumerable());
    }

    #[test]
    fn test_own_non_enumerable() {
        let obj = JsObject::new(None);
        obj.set_own_non_enumerable(PropertyKey::string("hidden"), Value::int32(1));
        let desc = obj.get_own(&PropertyKey::string("hidden")).unwrap();
        assert!(!desc.is_enumerable());
        assert!(desc.is_writable());
        assert!(desc.is_configurable());
    }

    #[test]
    fn test_prototype_chain_lookup() {
        let proto = JsObject::alloc(None);
        proto.set_own(PropertyKey::string("inherited"), Value::int32(7));
        let obj = JsObject::new(Some(proto));
        let desc = obj.find_property(&PropertyKey::string("inherited")).unwrap();
        assert_eq!(desc.data_value().unwrap().as_int32(), Some(7));
        assert!(!obj.has_own(&PropertyKey::string("inherited")));
        assert!(obj.has(&PropertyKey::string("inherited")));
    }

    #[test]
    fn test_cyclic_prototype_rejected() {
        let a = JsObject::alloc(None);
        let b = JsObject::alloc(Some(a.clone()));
        let err = JsObject::set_prototype(&a, Some(b)).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
    }

    #[test]
    fn test_set_prototype_on_non_extensible_fails() {
        let a = JsObject::alloc(None);
        a.prevent_extensions();
        let proto = JsObject::alloc(None);
        assert!(JsObject::set_prototype(&a, Some(proto)).is_err());
    }

    #[test]
    fn test_delete_non_configurable_fails() {
        let obj = JsObject::new(None);
        obj.define_own_property(
            PropertyKey::string("locked"),
            PropertyDescriptor::data_with_attrs(Value::int32(1), PropertyAttributes::frozen()),
        )
        .unwrap();
        assert!(obj.delete(&PropertyKey::string("locked")).is_err());
        assert!(obj.delete(&PropertyKey::string("missing")).unwrap() == false);
    }

    #[test]
    fn test_redefine_non_configurable_rejected() {
        let obj = JsObject::new(None);
        obj.define_own_property(
            PropertyKey::string("x"),
            PropertyDescriptor::data_with_attrs(Value::int32(1), PropertyAttributes::frozen()),
        )
        .unwrap();
        // Widening configurable: rejected.
        let err = obj
            .define_own_property(PropertyKey::string("x"), PropertyDescriptor::data(Value::int32(2)))
            .unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
        // Same frozen value: allowed.
        obj.define_own_property(
            PropertyKey::string("x"),
            PropertyDescriptor::data_with_attrs(Value::int32(1), PropertyAttributes::frozen()),
        )
        .unwrap();
    }

    #[test]
    fn test_own_keys_ordering() {
        let obj = JsObject::new(None);
        obj.set_own(PropertyKey::string("b"), Value::int32(1));
        obj.set_own(PropertyKey::string("a"), Value::int32(2));
        let sym = JsSymbol::new(None);
        obj.set_own(PropertyKey::symbol(sym), Value::int32(3));
        obj.set_own(PropertyKey::string("c"), Value::int32(4));

        let keys = obj.own_keys();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[0].display(), "b");
        assert_eq!(keys[1].display(), "a");
        assert_eq!(keys[2].display(), "c");
        assert!(keys[3].is_symbol());
    }

    #[test]
    fn test_element_holes() {
        let obj = JsObject::new(None);
        obj.set_element(0, Value::int32(1));
        obj.set_element(2, Value::int32(3));
        assert_eq!(obj.elements_len(), 3);
        assert!(obj.element(1).is_none());
        assert!(!obj.has_own(&PropertyKey::index(1)));
        assert!(obj.has_own(&PropertyKey::index(2)));
    }

    #[test]
    fn test_dictionary_promotion_on_delete() {
        let obj = JsObject::new(None);
        obj.set_own(PropertyKey::string("a"), Value::int32(1));
        assert_eq!(obj.shape_mode(), ShapeMode::Plain);
        obj.delete(&PropertyKey::string("a")).unwrap();
        assert_eq!(obj.shape_mode(), ShapeMode::Dictionary);
        // Semantics unchanged after promotion.
        obj.set_own(PropertyKey::string("b"), Value::int32(2));
        assert!(obj.has_own(&PropertyKey::string("b")));
        assert!(!obj.has_own(&PropertyKey::string("a")));
    }
}
