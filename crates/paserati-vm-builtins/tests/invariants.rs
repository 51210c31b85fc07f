//! Structural invariants of the installed builtin graph.

mod common;

use common::*;
use paserati_vm_core::convert;
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::{GcRef, Value};

#[test]
fn typed_array_constructors_chain_through_the_abstract_intrinsic() {
    let engine = engine();
    let mut cx = engine.context();
    let abstract_ctor = engine
        .realm()
        .intrinsic(intrinsic_keys::TYPED_ARRAY)
        .expect("%TypedArray% installed");
    let abstract_ctor_object = abstract_ctor.as_native_function().unwrap().object.clone();
    let abstract_proto = engine
        .realm()
        .intrinsic_object(intrinsic_keys::TYPED_ARRAY_PROTOTYPE)
        .unwrap();

    for name in [
        "Int8Array",
        "Uint8Array",
        "Uint8ClampedArray",
        "Int16Array",
        "Uint16Array",
        "Int32Array",
        "Uint32Array",
        "Float32Array",
        "Float64Array",
        "BigInt64Array",
        "BigUint64Array",
    ] {
        let ctor = global(&engine, &mut cx, name);
        let ctor_object = ctor.as_native_function().unwrap().object.clone();

        // Object.getPrototypeOf(T) === TypedArray
        assert!(
            GcRef::ptr_eq(&ctor_object.prototype().unwrap(), &abstract_ctor_object),
            "{name} constructor prototype chain"
        );

        // Object.getPrototypeOf(T.prototype) === TypedArray.prototype
        let proto = ctor_object
            .get_own(&PropertyKey::string("prototype"))
            .unwrap()
            .data_value()
            .unwrap()
            .as_object()
            .unwrap();
        assert!(
            GcRef::ptr_eq(&proto.prototype().unwrap(), &abstract_proto),
            "{name} prototype chain"
        );
    }
}

#[test]
fn bytes_per_element_is_fully_frozen() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Float64Array");
    let ctor_object = ctor.as_native_function().unwrap().object.clone();

    let on_ctor = ctor_object
        .get_own(&PropertyKey::string("BYTES_PER_ELEMENT"))
        .expect("static BYTES_PER_ELEMENT");
    assert!(!on_ctor.is_writable());
    assert!(!on_ctor.is_enumerable());
    assert!(!on_ctor.is_configurable());
    assert_eq!(on_ctor.data_value().unwrap().as_number(), Some(8.0));

    let proto = ctor_object
        .get_own(&PropertyKey::string("prototype"))
        .unwrap()
        .data_value()
        .unwrap()
        .as_object()
        .unwrap();
    let on_proto = proto
        .get_own(&PropertyKey::string("BYTES_PER_ELEMENT"))
        .expect("prototype BYTES_PER_ELEMENT");
    assert!(!on_proto.is_writable());
    assert!(!on_proto.is_enumerable());
    assert!(!on_proto.is_configurable());
}

#[test]
fn error_detection_is_by_slot_not_prototype() {
    let engine = engine();
    let mut cx = engine.context();
    let is_error = |cx: &mut paserati_vm_core::NativeContext, v: Value| {
        let error_ctor = {
            let global = Value::object(engine.realm().global.clone());
            cx.get(&global, &PropertyKey::string("Error")).unwrap()
        };
        let result = call_method(cx, &error_ctor, "isError", &[v]).unwrap();
        result.as_boolean().unwrap()
    };

    for name in [
        "Error",
        "EvalError",
        "RangeError",
        "ReferenceError",
        "SyntaxError",
        "TypeError",
        "URIError",
    ] {
        let ctor = global(&engine, &mut cx, name);
        let err = construct(&mut cx, &ctor, &[Value::string("x")]).unwrap();
        assert!(is_error(&mut cx, err), "{name} instance carries [[ErrorData]]");
    }

    // AggregateError takes an iterable first.
    let agg = global(&engine, &mut cx, "AggregateError");
    let errors = {
        let array_ctor = global(&engine, &mut cx, "Array");
        construct(&mut cx, &array_ctor, &[]).unwrap()
    };
    let err = construct(&mut cx, &agg, &[errors, Value::string("m")]).unwrap();
    assert!(is_error(&mut cx, err));

    // A lookalike plain object is not an error.
    let object_ctor = global(&engine, &mut cx, "Object");
    let fake = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&fake, &PropertyKey::string("name"), Value::string("Error"))
        .unwrap();
    cx.set(&fake, &PropertyKey::string("message"), Value::string("x"))
        .unwrap();
    assert!(!is_error(&mut cx, fake));
}

#[test]
fn promise_resolution_is_one_shot() {
    let engine = engine();
    let mut cx = engine.context();
    let p = paserati_vm_core::promise::JsPromise::new_pending();
    cx.resolve_promise(&p, Value::int32(1));
    cx.resolve_promise(&p, Value::int32(2));
    assert!(p.is_fulfilled());
    assert_eq!(p.value().unwrap().as_int32(), Some(1));

    let q = paserati_vm_core::promise::JsPromise::new_pending();
    cx.reject_promise(&q, Value::string("a"));
    cx.resolve_promise(&q, Value::int32(3));
    assert!(q.is_rejected());
}

#[test]
fn uint8_clamped_element_coercion() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Uint8ClampedArray");
    let arr = construct(&mut cx, &ctor, &[Value::int32(1)]).unwrap();

    let expectations = [
        (Value::int32(300), 255.0),
        (Value::int32(-1), 0.0),
        (Value::Float(f64::NAN), 0.0),
        (Value::Float(2.5), 2.0),
        (Value::Float(3.5), 4.0),
    ];
    for (input, expected) in expectations {
        let source = {
            let array_ctor = global(&engine, &mut cx, "Array");
            construct(&mut cx, &array_ctor, &[]).unwrap()
        };
        call_method(&mut cx, &source, "push", &[input.clone()]).unwrap();
        call_method(&mut cx, &arr, "set", &[source]).unwrap();
        let stored = cx.get(&arr, &PropertyKey::index(0)).unwrap();
        assert_eq!(
            stored.as_number(),
            Some(expected),
            "clamped write of {input:?}"
        );
    }
}

#[test]
fn integer_kinds_wrap_modularly() {
    let engine = engine();
    let mut cx = engine.context();

    let int8 = global(&engine, &mut cx, "Int8Array");
    let arr = construct(&mut cx, &int8, &[Value::int32(1)]).unwrap();
    cx.set(&arr, &PropertyKey::index(0), Value::int32(128)).unwrap();
    assert_eq!(number_of(&cx.get(&arr, &PropertyKey::index(0)).unwrap()), -128.0);

    let uint16 = global(&engine, &mut cx, "Uint16Array");
    let arr = construct(&mut cx, &uint16, &[Value::int32(1)]).unwrap();
    cx.set(&arr, &PropertyKey::index(0), Value::int32(65537)).unwrap();
    assert_eq!(number_of(&cx.get(&arr, &PropertyKey::index(0)).unwrap()), 1.0);
}

#[test]
fn negative_typed_array_length_is_range_error() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Int32Array");
    let err = construct(&mut cx, &ctor, &[Value::int32(-1)]).unwrap_err();
    assert!(matches!(err, paserati_vm_core::VmError::RangeError(_)));
}

#[test]
fn misaligned_view_is_range_error() {
    let engine = engine();
    let mut cx = engine.context();
    let buffer_ctor = global(&engine, &mut cx, "ArrayBuffer");
    let buffer = construct(&mut cx, &buffer_ctor, &[Value::int32(8)]).unwrap();
    let int32 = global(&engine, &mut cx, "Int32Array");
    let err = construct(&mut cx, &int32, &[buffer, Value::int32(2)]).unwrap_err();
    assert!(matches!(err, paserati_vm_core::VmError::RangeError(_)));
}

#[test]
fn typed_array_buffer_getter_returns_backing_buffer() {
    let engine = engine();
    let mut cx = engine.context();
    let buffer_ctor = global(&engine, &mut cx, "ArrayBuffer");
    let buffer = construct(&mut cx, &buffer_ctor, &[Value::int32(8)]).unwrap();
    let int32 = global(&engine, &mut cx, "Int32Array");
    let arr = construct(&mut cx, &int32, &[buffer.clone()]).unwrap();

    let via_getter = get(&mut cx, &arr, "buffer");
    assert!(convert::strict_equals(&via_getter, &buffer));
}

#[test]
fn typed_array_accessors_reject_foreign_receivers() {
    let engine = engine();
    let mut cx = engine.context();
    let proto = engine
        .realm()
        .intrinsic_object(intrinsic_keys::TYPED_ARRAY_PROTOTYPE)
        .unwrap();
    let desc = proto.get_own(&PropertyKey::string("length")).unwrap();
    let getter = desc.getter().unwrap().clone();
    let not_a_view = Value::object(paserati_vm_core::object::JsObject::alloc(None));
    let err = cx.call(&getter, &not_a_view, &[]).unwrap_err();
    assert!(matches!(err, paserati_vm_core::VmError::TypeError(_)));
}

#[test]
fn symbol_registry_crosses_realms() {
    let mut engine = engine();
    let second = engine.create_realm().unwrap();
    let mut cx = engine.context();

    let symbol_ctor = global(&engine, &mut cx, "Symbol");
    let shared = call_method(&mut cx, &symbol_ctor, "for", &[Value::string("app.key")]).unwrap();

    // The second realm's Symbol.for returns the identical symbol.
    let global2 = Value::object(second.global.clone());
    let symbol_ctor2 = cx.get(&global2, &PropertyKey::string("Symbol")).unwrap();
    let shared2 = call_method(&mut cx, &symbol_ctor2, "for", &[Value::string("app.key")]).unwrap();
    assert!(convert::strict_equals(&shared, &shared2));

    let key = call_method(&mut cx, &symbol_ctor2, "keyFor", &[shared]).unwrap();
    assert_eq!(string_of(&key), "app.key");
}

#[test]
fn weak_map_rejects_primitive_keys() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "WeakMap");
    let map = construct(&mut cx, &ctor, &[]).unwrap();
    let err = call_method(
        &mut cx,
        &map,
        "set",
        &[Value::int32(1), Value::int32(2)],
    )
    .unwrap_err();
    assert!(matches!(err, paserati_vm_core::VmError::TypeError(_)));
}
