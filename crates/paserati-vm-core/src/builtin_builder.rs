//! Builder for spec-correct builtin constructors and prototypes.
//!
//! Ensures builtin methods get the right property attributes
//! (non-enumerable), function objects carry `length` and `name`, the
//! constructor↔prototype back-links are wired, and every function's
//! `[[Prototype]]` is the realm's `%Function.prototype%`.

use std::sync::Arc;

use crate::error::VmResult;
use crate::gc::GcRef;
use crate::object::{JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey};
use crate::realm::Realm;
use crate::string::JsString;
use crate::symbol::JsSymbol;
use crate::value::{NativeFn, NativeFunctionObject, Value};

/// Create a plain native callable with correct `name` and `length`.
pub fn native_callable<F>(realm: &Realm, name: &str, length: u32, f: F) -> Value
where
    F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
        + Send
        + Sync
        + 'static,
{
    make_function(realm, Arc::new(f), name, length, false)
}

/// Create a native constructor (callable with `new`).
pub fn native_constructor<F>(realm: &Realm, name: &str, length: u32, f: F) -> Value
where
    F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
        + Send
        + Sync
        + 'static,
{
    make_function(realm, Arc::new(f), name, length, true)
}

fn make_function(
    realm: &Realm,
    func: NativeFn,
    name: &str,
    length: u32,
    constructable: bool,
) -> Value {
    let object = JsObject::alloc(Some(realm.function_prototype()));
    install_function_metadata(&object, name, length);
    Value::NativeFunction(GcRef::new(NativeFunctionObject {
        func,
        object,
        realm: realm.id,
        constructable,
    }))
}

fn install_function_metadata(object: &GcRef<JsObject>, name: &str, length: u32) {
    object
        .define_own_property(
            PropertyKey::string("length"),
            PropertyDescriptor::function_length(Value::number(length as f64)),
        )
        .expect("fresh function object");
    object
        .define_own_property(
            PropertyKey::string("name"),
            PropertyDescriptor::function_length(Value::string(JsString::intern(name))),
        )
        .expect("fresh function object");
}

/// A deferred property definition applied during `build()`.
enum DeferredProperty {
    Method {
        name: String,
        func: NativeFn,
        length: u32,
    },
    StaticMethod {
        name: String,
        func: NativeFn,
        length: u32,
    },
    Property {
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
    },
    StaticProperty {
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
    },
    Accessor {
        name: String,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    },
    StaticAccessor {
        name: String,
        getter: Option<NativeFn>,
        setter: Option<NativeFn>,
    },
    SymbolMethod {
        symbol: GcRef<JsSymbol>,
        name: String,
        func: NativeFn,
        length: u32,
    },
}

/// Builder for a constructor + prototype pair.
pub struct BuiltInBuilder {
    realm: Realm,
    name: String,
    prototype: GcRef<JsObject>,
    parent_proto: Option<GcRef<JsObject>>,
    ctor_parent: Option<GcRef<JsObject>>,
    ctor_fn: Option<NativeFn>,
    ctor_length: u32,
    properties: Vec<DeferredProperty>,
}

impl BuiltInBuilder {
    /// Start a builder; the prototype object is allocated immediately so
    /// dependents can link against it before `build()`.
    pub fn new(realm: &Realm, name: &str) -> Self {
        let prototype = JsObject::alloc(None);
        Self {
            realm: realm.clone(),
            name: name.to_string(),
            prototype,
            parent_proto: Some(realm.object_prototype()),
            ctor_parent: None,
            ctor_fn: None,
            ctor_length: 0,
            properties: Vec::new(),
        }
    }

    /// Reuse a pre-allocated prototype object (two-stage initialization).
    pub fn with_prototype(realm: &Realm, name: &str, prototype: GcRef<JsObject>) -> Self {
        Self {
            realm: realm.clone(),
            name: name.to_string(),
            prototype,
            parent_proto: Some(realm.object_prototype()),
            ctor_parent: None,
            ctor_fn: None,
            ctor_length: 0,
            properties: Vec::new(),
        }
    }

    pub fn prototype_object(&self) -> GcRef<JsObject> {
        self.prototype.clone()
    }

    /// Set the prototype's `[[Prototype]]` (defaults to `%Object.prototype%`).
    pub fn inherits(mut self, parent: GcRef<JsObject>) -> Self {
        self.parent_proto = Some(parent);
        self
    }

    /// The prototype ends the chain (`Object.prototype` itself).
    pub fn chain_end(mut self) -> Self {
        self.parent_proto = None;
        self
    }

    /// `[[Prototype]]` of the constructor itself (defaults to
    /// `%Function.prototype%`); error subclasses and concrete typed arrays
    /// chain their constructors through the parent constructor.
    pub fn constructor_inherits(mut self, parent: GcRef<JsObject>) -> Self {
        self.ctor_parent = Some(parent);
        self
    }

    pub fn constructor_fn<F>(mut self, f: F, length: u32) -> Self
    where
        F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.ctor_fn = Some(Arc::new(f));
        self.ctor_length = length;
        self
    }

    /// Prototype method with `{writable, non-enumerable, configurable}`.
    pub fn method<F>(mut self, name: &str, f: F, length: u32) -> Self
    where
        F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::Method {
            name: name.to_string(),
            func: Arc::new(f),
            length,
        });
        self
    }

    pub fn static_method<F>(mut self, name: &str, f: F, length: u32) -> Self
    where
        F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::StaticMethod {
            name: name.to_string(),
            func: Arc::new(f),
            length,
        });
        self
    }

    pub fn property(mut self, key: PropertyKey, value: Value, attrs: PropertyAttributes) -> Self {
        self.properties
            .push(DeferredProperty::Property { key, value, attrs });
        self
    }

    pub fn static_property(
        mut self,
        key: PropertyKey,
        value: Value,
        attrs: PropertyAttributes,
    ) -> Self {
        self.properties
            .push(DeferredProperty::StaticProperty { key, value, attrs });
        self
    }

    pub fn accessor<G>(mut self, name: &str, getter: G) -> Self
    where
        G: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::Accessor {
            name: name.to_string(),
            getter: Some(Arc::new(getter)),
            setter: None,
        });
        self
    }

    pub fn accessor_with_setter<G, S>(mut self, name: &str, getter: G, setter: S) -> Self
    where
        G: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
        S: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::Accessor {
            name: name.to_string(),
            getter: Some(Arc::new(getter)),
            setter: Some(Arc::new(setter)),
        });
        self
    }

    pub fn static_accessor<G>(mut self, name: &str, getter: G) -> Self
    where
        G: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::StaticAccessor {
            name: name.to_string(),
            getter: Some(Arc::new(getter)),
            setter: None,
        });
        self
    }

    /// Symbol-keyed prototype method, e.g. `[Symbol.iterator]`.
    pub fn symbol_method<F>(mut self, symbol: GcRef<JsSymbol>, name: &str, f: F, length: u32) -> Self
    where
        F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::SymbolMethod {
            symbol,
            name: name.to_string(),
            func: Arc::new(f),
            length,
        });
        self
    }

    /// Wire everything up. Returns `(constructor, prototype)`.
    pub fn build(self) -> (Value, GcRef<JsObject>) {
        let BuiltInBuilder {
            realm,
            name,
            prototype,
            parent_proto,
            ctor_parent,
            ctor_fn,
            ctor_length,
            properties,
        } = self;

        prototype.set_prototype_unchecked(parent_proto);

        for prop in properties {
            match prop {
                DeferredProperty::Method {
                    name: method_name,
                    func,
                    length,
                } => {
                    let value = make_function(&realm, func, &method_name, length, false);
                    define(&prototype, PropertyKey::string(&method_name), value);
                }
                DeferredProperty::Property { key, value, attrs } => {
                    let _ = prototype
                        .define_own_property(key, PropertyDescriptor::data_with_attrs(value, attrs));
                }
                DeferredProperty::Accessor {
                    name: acc_name,
                    getter,
                    setter,
                } => {
                    install_accessor(&realm, &prototype, &acc_name, getter, setter);
                }
                DeferredProperty::SymbolMethod {
                    symbol,
                    name: sym_name,
                    func,
                    length,
                } => {
                    let value = make_function(&realm, func, &format!("[{sym_name}]"), length, false);
                    define(&prototype, PropertyKey::symbol(symbol), value);
                }
                // Static entries are applied after the constructor exists.
                DeferredProperty::StaticMethod { .. }
                | DeferredProperty::StaticProperty { .. }
                | DeferredProperty::StaticAccessor { .. } => {}
            }
        }

        // The constructor: provided behavior, or a constructor-only shell.
        let ctor_fn = ctor_fn.unwrap_or_else(|| {
            Arc::new(|_this: &Value, _args: &[Value], _cx: &mut crate::context::NativeContext| {
                Ok(Value::Undefined)
            })
        });
        let ctor = make_function(&realm, ctor_fn, &name, ctor_length, true);
        let ctor_object = ctor
            .as_native_function()
            .expect("constructor is a native function")
            .object
            .clone();
        if let Some(parent) = ctor_parent {
            ctor_object.set_prototype_unchecked(Some(parent));
        }

        // Re-run the deferred list for static entries, now that the
        // constructor object exists.
        let _ = ctor_object.define_own_property(
            PropertyKey::string("prototype"),
            PropertyDescriptor::data_with_attrs(
                Value::object(prototype.clone()),
                PropertyAttributes::frozen(),
            ),
        );
        let _ = prototype.define_own_property(
            PropertyKey::string("constructor"),
            PropertyDescriptor::data_with_attrs(
                ctor.clone(),
                PropertyAttributes::constructor_link(),
            ),
        );

        (ctor, prototype)
    }

    /// Like [`build`](Self::build) but applies static entries too; split
    /// out because static entries need the constructor object.
    pub fn build_with_statics(mut self) -> (Value, GcRef<JsObject>) {
        let statics: Vec<DeferredProperty> = {
            let mut rest = Vec::new();
            let mut kept = Vec::new();
            for prop in self.properties.drain(..) {
                match prop {
                    DeferredProperty::StaticMethod { .. }
                    | DeferredProperty::StaticProperty { .. }
                    | DeferredProperty::StaticAccessor { .. } => rest.push(prop),
                    other => kept.push(other),
                }
            }
            self.properties = kept;
            rest
        };
        let realm = self.realm.clone();
        let (ctor, prototype) = self.build();
        let ctor_object = ctor
            .as_native_function()
            .expect("constructor is a native function")
            .object
            .clone();
        for prop in statics {
            match prop {
                DeferredProperty::StaticMethod { name, func, length } => {
                    let value = make_function(&realm, func, &name, length, false);
                    define(&ctor_object, PropertyKey::string(&name), value);
                }
                DeferredProperty::StaticProperty { key, value, attrs } => {
                    let _ = ctor_object
                        .define_own_property(key, PropertyDescriptor::data_with_attrs(value, attrs));
                }
                DeferredProperty::StaticAccessor { name, getter, setter } => {
                    install_accessor(&realm, &ctor_object, &name, getter, setter);
                }
                _ => unreachable!(),
            }
        }
        (ctor, prototype)
    }
}

fn define(target: &GcRef<JsObject>, key: PropertyKey, value: Value) {
    let _ = target.define_own_property(key, PropertyDescriptor::builtin_method(value));
}

fn install_accessor(
    realm: &Realm,
    target: &GcRef<JsObject>,
    name: &str,
    getter: Option<NativeFn>,
    setter: Option<NativeFn>,
) {
    let get = getter.map(|g| make_function(realm, g, &format!("get {name}"), 0, false));
    let set = setter.map(|s| make_function(realm, s, &format!("set {name}"), 1, false));
    let _ = target.define_own_property(
        PropertyKey::string(name),
        PropertyDescriptor::accessor(get, set, PropertyAttributes::builtin_accessor()),
    );
}

/// Builder for namespace objects (`Math`, `JSON`, `console`): plain objects
/// with methods, not constructors.
pub struct NamespaceBuilder {
    realm: Realm,
    object: GcRef<JsObject>,
    properties: Vec<DeferredProperty>,
}

impl NamespaceBuilder {
    pub fn new(realm: &Realm) -> Self {
        Self {
            realm: realm.clone(),
            object: JsObject::alloc(Some(realm.object_prototype())),
            properties: Vec::new(),
        }
    }

    pub fn method<F>(mut self, name: &str, f: F, length: u32) -> Self
    where
        F: Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.properties.push(DeferredProperty::Method {
            name: name.to_string(),
            func: Arc::new(f),
            length,
        });
        self
    }

    pub fn property(mut self, key: PropertyKey, value: Value, attrs: PropertyAttributes) -> Self {
        self.properties
            .push(DeferredProperty::Property { key, value, attrs });
        self
    }

    pub fn build(self) -> Value {
        let NamespaceBuilder {
            realm,
            object,
            properties,
        } = self;
        for prop in properties {
            match prop {
                DeferredProperty::Method { name, func, length } => {
                    let value = make_function(&realm, func, &name, length, false);
                    define(&object, PropertyKey::string(&name), value);
                }
                DeferredProperty::Property { key, value, attrs } => {
                    let _ = object
                        .define_own_property(key, PropertyDescriptor::data_with_attrs(value, attrs));
                }
                _ => {}
            }
        }
        Value::object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::RealmRegistry;

    fn realm() -> Realm {
        RealmRegistry::new().create_realm()
    }

    #[test]
    fn test_builder_wires_constructor_and_prototype() {
        let realm = realm();
        let (ctor, proto) = BuiltInBuilder::new(&realm, "Widget")
            .method("poke", |_t, _a, _c| Ok(Value::int32(1)), 0)
            .build_with_statics();

        // constructor.prototype === prototype, frozen
        let desc = ctor
            .as_native_function()
            .unwrap()
            .object
            .get_own(&PropertyKey::string("prototype"))
            .unwrap();
        assert!(!desc.is_enumerable() && !desc.is_configurable() && !desc.is_writable());
        assert!(GcRef::ptr_eq(
            &desc.data_value().unwrap().as_object().unwrap(),
            &proto
        ));

        // prototype.constructor === constructor, non-enumerable
        let back = proto.get_own(&PropertyKey::string("constructor")).unwrap();
        assert!(!back.is_enumerable());

        // method attributes
        let poke = proto.get_own(&PropertyKey::string("poke")).unwrap();
        assert!(!poke.is_enumerable());
        assert!(poke.is_writable());
        assert!(poke.is_configurable());
    }

    #[test]
    fn test_function_metadata() {
        let realm = realm();
        let f = native_callable(&realm, "three", 3, |_t, _a, _c| Ok(Value::Undefined));
        let obj = &f.as_native_function().unwrap().object;
        let length = obj.get_own(&PropertyKey::string("length")).unwrap();
        assert_eq!(length.data_value().unwrap().as_int32(), Some(3));
        assert!(!length.is_writable());
        assert_eq!(f.function_name().as_deref(), Some("three"));
    }

    #[test]
    fn test_constructor_chain_for_subclasses() {
        let realm = realm();
        let (base_ctor, base_proto) = BuiltInBuilder::new(&realm, "Base").build_with_statics();
        let base_ctor_obj = base_ctor.as_native_function().unwrap().object.clone();
        let (sub_ctor, sub_proto) = BuiltInBuilder::new(&realm, "Sub")
            .inherits(base_proto.clone())
            .constructor_inherits(base_ctor_obj.clone())
            .build_with_statics();

        assert!(GcRef::ptr_eq(&sub_proto.prototype().unwrap(), &base_proto));
        let sub_ctor_obj = sub_ctor.as_native_function().unwrap().object.clone();
        assert!(GcRef::ptr_eq(
            &sub_ctor_obj.prototype().unwrap(),
            &base_ctor_obj
        ));
    }

    #[test]
    fn test_namespace_builder() {
        let realm = realm();
        let ns = NamespaceBuilder::new(&realm)
            .method("f", |_t, _a, _c| Ok(Value::int32(9)), 0)
            .property(
                PropertyKey::string("K"),
                Value::int32(7),
                PropertyAttributes::frozen(),
            )
            .build();
        let obj = ns.as_object().unwrap();
        assert!(obj.get_own(&PropertyKey::string("f")).is_some());
        let k = obj.get_own(&PropertyKey::string("K")).unwrap();
        assert!(!k.is_writable());
    }
}
