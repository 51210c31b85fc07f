//! The `Object` builtin: the root of every prototype chain.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{
    JsObject, PropertyAttributes, PropertyDescriptor, PropertyKey,
};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array, new_plain_object, to_property_key};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct ObjectBuiltin;

impl Builtin for ObjectBuiltin {
    fn name(&self) -> &'static str {
        "Object"
    }

    fn priority(&self) -> u32 {
        priority::OBJECT
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_type_alias("object", Type::Object(vec![]));
        tcx.define_global(
            "Object",
            Type::ctor(vec![Type::Any], Type::named("object")),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let object_prototype = realm.object_prototype();

        let (ctor, proto) = BuiltInBuilder::with_prototype(&realm, "Object", object_prototype)
            .chain_end()
            .constructor_fn(object_constructor, 1)
            .method("hasOwnProperty", has_own_property, 1)
            .method("isPrototypeOf", is_prototype_of, 1)
            .method("propertyIsEnumerable", property_is_enumerable, 1)
            .method("toString", object_to_string, 0)
            .method("valueOf", |this, _args, _cx| Ok(this.clone()), 0)
            .static_method("getPrototypeOf", get_prototype_of, 1)
            .static_method("setPrototypeOf", set_prototype_of, 2)
            .static_method("defineProperty", define_property, 3)
            .static_method("getOwnPropertyDescriptor", get_own_property_descriptor, 2)
            .static_method("getOwnPropertyNames", get_own_property_names, 1)
            .static_method("keys", object_keys, 1)
            .static_method("values", object_values, 1)
            .static_method("entries", object_entries, 1)
            .static_method("create", object_create, 2)
            .static_method("assign", object_assign, 2)
            .static_method("freeze", object_freeze, 1)
            .static_method("isFrozen", object_is_frozen, 1)
            .static_method("preventExtensions", prevent_extensions, 1)
            .static_method("isExtensible", is_extensible, 1)
            .build_with_statics();

        // The prototype object is the realm skeleton's %ObjectPrototype%;
        // only the constructor binding is new.
        rcx.set_intrinsic(intrinsic_keys::OBJECT_PROTOTYPE, Value::object(proto));
        rcx.define_global("Object", ctor);
        Ok(())
    }
}

fn object_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let value = arg(args, 0);
    if value.is_nullish() {
        return Ok(Value::object(new_plain_object(&cx.current_realm())));
    }
    if value.is_object() {
        return Ok(value.clone());
    }
    // Primitive wrapping is handled by the wrapper constructors; plain
    // Object() over a primitive yields a fresh empty object.
    Ok(Value::object(new_plain_object(&cx.current_realm())))
}

fn has_own_property(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let key = to_property_key(cx, arg(args, 0))?;
    let Some(obj) = this.as_object() else {
        return Ok(Value::boolean(false));
    };
    Ok(Value::boolean(obj.has_own(&key)))
}

fn is_prototype_of(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(target) = arg(args, 0).as_object() else {
        return Ok(Value::boolean(false));
    };
    let Some(candidate) = this.as_object() else {
        return Ok(Value::boolean(false));
    };
    let mut cursor = target.prototype();
    while let Some(p) = cursor {
        if paserati_vm_core::GcRef::ptr_eq(&p, &candidate) {
            return Ok(Value::boolean(true));
        }
        cursor = p.prototype();
    }
    Ok(Value::boolean(false))
}

fn property_is_enumerable(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let key = to_property_key(cx, arg(args, 0))?;
    let Some(obj) = this.as_object() else {
        return Ok(Value::boolean(false));
    };
    Ok(Value::boolean(
        obj.get_own(&key).is_some_and(|d| d.is_enumerable()),
    ))
}

fn object_to_string(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let tag = if this.is_object() {
        let key = PropertyKey::symbol(well_known_symbols().to_string_tag.clone());
        let tag_value = cx.get(this, &key)?;
        match tag_value.as_string() {
            Some(s) => s.as_str().to_string(),
            None => default_tag(this).to_string(),
        }
    } else {
        default_tag(this).to_string()
    };
    Ok(Value::string(format!("[object {tag}]")))
}

fn default_tag(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Array(_) => "Array",
        Value::NativeFunction(_) => "Function",
        Value::Boolean(_) => "Boolean",
        Value::String(_) => "String",
        Value::Int32(_) | Value::Float(_) => "Number",
        _ => "Object",
    }
}

fn get_prototype_of(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(obj) = arg(args, 0).as_object() else {
        return Err(VmError::type_error(
            "Object.getPrototypeOf called on non-object",
        ));
    };
    Ok(match obj.prototype() {
        Some(proto) => Value::object(proto),
        None => Value::Null,
    })
}

fn set_prototype_of(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0);
    let Some(obj) = target.as_object() else {
        return Err(VmError::type_error(
            "Object.setPrototypeOf called on non-object",
        ));
    };
    let proto = arg(args, 1);
    let proto_obj = match proto {
        Value::Null => None,
        other => match other.as_object() {
            Some(p) => Some(p),
            None => {
                return Err(VmError::type_error("Object prototype may only be an object or null"));
            }
        },
    };
    JsObject::set_prototype(&obj, proto_obj)?;
    Ok(target.clone())
}

/// Translate a JS descriptor object into a `PropertyDescriptor`.
fn parse_descriptor(cx: &mut NativeContext, desc: &Value) -> VmResult<PropertyDescriptor> {
    let Some(desc_obj) = desc.as_object() else {
        return Err(VmError::type_error("Property description must be an object"));
    };
    let read_flag = |obj: &paserati_vm_core::GcRef<JsObject>, name: &str| -> Option<bool> {
        obj.get_own(&PropertyKey::string(name))
            .and_then(|d| d.data_value().cloned())
            .map(|v| v.to_boolean())
    };
    let enumerable = read_flag(&desc_obj, "enumerable").unwrap_or(false);
    let configurable = read_flag(&desc_obj, "configurable").unwrap_or(false);

    let get = cx.get(desc, &PropertyKey::string("get"))?;
    let set = cx.get(desc, &PropertyKey::string("set"))?;
    if !get.is_undefined() || !set.is_undefined() {
        for accessor in [&get, &set] {
            if !accessor.is_undefined() && !accessor.is_callable() {
                return Err(VmError::type_error("Getter/setter must be callable"));
            }
        }
        return Ok(PropertyDescriptor::accessor(
            (!get.is_undefined()).then_some(get),
            (!set.is_undefined()).then_some(set),
            PropertyAttributes {
                writable: false,
                enumerable,
                configurable,
            },
        ));
    }

    let value = cx.get(desc, &PropertyKey::string("value"))?;
    let writable = read_flag(&desc_obj, "writable").unwrap_or(false);
    Ok(PropertyDescriptor::data_with_attrs(
        value,
        PropertyAttributes {
            writable,
            enumerable,
            configurable,
        },
    ))
}

fn define_property(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0);
    let Some(obj) = target.as_object() else {
        return Err(VmError::type_error("Object.defineProperty called on non-object"));
    };
    let key = to_property_key(cx, arg(args, 1))?;
    let desc = parse_descriptor(cx, arg(args, 2))?;
    obj.define_own_property(key, desc)?;
    Ok(target.clone())
}

fn get_own_property_descriptor(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
) -> VmResult<Value> {
    let Some(obj) = arg(args, 0).as_object() else {
        return Err(VmError::type_error(
            "Object.getOwnPropertyDescriptor called on non-object",
        ));
    };
    let key = to_property_key(cx, arg(args, 1))?;
    let Some(desc) = obj.get_own(&key) else {
        return Ok(Value::Undefined);
    };
    let realm = cx.current_realm();
    let out = new_plain_object(&realm);
    match &desc {
        PropertyDescriptor::Data { value, attributes } => {
            out.set_own(PropertyKey::string("value"), value.clone());
            out.set_own(
                PropertyKey::string("writable"),
                Value::boolean(attributes.writable),
            );
        }
        PropertyDescriptor::Accessor { get, set, .. } => {
            out.set_own(
                PropertyKey::string("get"),
                get.clone().unwrap_or(Value::Undefined),
            );
            out.set_own(
                PropertyKey::string("set"),
                set.clone().unwrap_or(Value::Undefined),
            );
        }
    }
    out.set_own(
        PropertyKey::string("enumerable"),
        Value::boolean(desc.is_enumerable()),
    );
    out.set_own(
        PropertyKey::string("configurable"),
        Value::boolean(desc.is_configurable()),
    );
    Ok(Value::object(out))
}

fn get_own_property_names(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(obj) = arg(args, 0).as_object() else {
        return Err(VmError::type_error(
            "Object.getOwnPropertyNames called on non-object",
        ));
    };
    let names = obj
        .own_keys()
        .into_iter()
        .filter(|k| !k.is_symbol())
        .map(|k| Value::string(k.display()))
        .collect();
    Ok(new_array(&cx.current_realm(), names))
}

fn object_keys(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(obj) = arg(args, 0).as_object() else {
        return Err(VmError::type_error("Object.keys called on non-object"));
    };
    let keys = obj
        .enumerable_string_keys()
        .into_iter()
        .map(|k| Value::string(k.display()))
        .collect();
    Ok(new_array(&cx.current_realm(), keys))
}

fn object_values(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0).clone();
    let Some(obj) = target.as_object() else {
        return Err(VmError::type_error("Object.values called on non-object"));
    };
    let mut values = Vec::new();
    for key in obj.enumerable_string_keys() {
        values.push(cx.get(&target, &key)?);
    }
    Ok(new_array(&cx.current_realm(), values))
}

fn object_entries(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0).clone();
    let Some(obj) = target.as_object() else {
        return Err(VmError::type_error("Object.entries called on non-object"));
    };
    let realm = cx.current_realm();
    let mut entries = Vec::new();
    for key in obj.enumerable_string_keys() {
        let value = cx.get(&target, &key)?;
        entries.push(new_array(
            &realm,
            vec![Value::string(key.display()), value],
        ));
    }
    Ok(new_array(&realm, entries))
}

fn object_create(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let proto = match arg(args, 0) {
        Value::Null => None,
        other => match other.as_object() {
            Some(p) => Some(p),
            None => {
                return Err(VmError::type_error(
                    "Object prototype may only be an object or null",
                ));
            }
        },
    };
    let obj = JsObject::alloc(proto);
    let props = arg(args, 1);
    if !props.is_undefined() {
        let Some(props_obj) = props.as_object() else {
            return Err(VmError::type_error("Properties argument must be an object"));
        };
        for key in props_obj.enumerable_string_keys() {
            let desc_value = cx.get(props, &key)?;
            let desc = parse_descriptor(cx, &desc_value)?;
            obj.define_own_property(key, desc)?;
        }
    }
    Ok(Value::object(obj))
}

fn object_assign(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0).clone();
    let Some(target_obj) = target.as_object() else {
        return Err(VmError::type_error("Object.assign target must be an object"));
    };
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        let Some(source_obj) = source.as_object() else {
            continue;
        };
        for key in source_obj.enumerable_string_keys() {
            let value = cx.get(source, &key)?;
            target_obj.set_own(key, value);
        }
    }
    Ok(target)
}

fn object_freeze(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0);
    if let Some(obj) = target.as_object() {
        obj.prevent_extensions();
        for key in obj.own_keys() {
            if let Some(desc) = obj.get_own(&key) {
                let frozen = match desc {
                    PropertyDescriptor::Data { value, attributes } => {
                        PropertyDescriptor::data_with_attrs(
                            value,
                            PropertyAttributes {
                                writable: false,
                                enumerable: attributes.enumerable,
                                configurable: false,
                            },
                        )
                    }
                    PropertyDescriptor::Accessor {
                        get,
                        set,
                        attributes,
                    } => PropertyDescriptor::accessor(
                        get,
                        set,
                        PropertyAttributes {
                            writable: false,
                            enumerable: attributes.enumerable,
                            configurable: false,
                        },
                    ),
                };
                obj.define_own_property_unchecked(key, frozen);
            }
        }
    }
    Ok(target.clone())
}

fn object_is_frozen(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(obj) = arg(args, 0).as_object() else {
        return Ok(Value::boolean(true));
    };
    if obj.is_extensible() {
        return Ok(Value::boolean(false));
    }
    let all_locked = obj.own_keys().iter().all(|key| {
        obj.get_own(key)
            .is_some_and(|d| !d.is_configurable() && !d.is_writable())
    });
    Ok(Value::boolean(all_locked))
}

fn prevent_extensions(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let target = arg(args, 0);
    if let Some(obj) = target.as_object() {
        obj.prevent_extensions();
    }
    Ok(target.clone())
}

fn is_extensible(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    Ok(Value::boolean(
        arg(args, 0).as_object().is_some_and(|o| o.is_extensible()),
    ))
}
