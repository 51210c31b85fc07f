//! End-to-end scenarios exercising the builtin surface the way hosted code
//! does.

mod common;

use common::*;
use paserati_vm_core::convert;
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::{NativeContext, Value};

fn new_map_with(
    engine: &paserati_vm_builtins::engine::Engine,
    cx: &mut NativeContext,
    entries: &[(&str, i32)],
) -> Value {
    let array_ctor = global(engine, cx, "Array");
    let list = construct(cx, &array_ctor, &[]).unwrap();
    for (k, v) in entries {
        let pair = construct(cx, &array_ctor, &[]).unwrap();
        call_method(cx, &pair, "push", &[Value::string(*k), Value::int32(*v)]).unwrap();
        call_method(cx, &list, "push", &[pair]).unwrap();
    }
    let map_ctor = global(engine, cx, "Map");
    construct(cx, &map_ctor, &[list]).unwrap()
}

fn next(cx: &mut NativeContext, iter: &Value) -> (Value, bool) {
    let step = call_method(cx, iter, "next", &[]).unwrap();
    let value = get(cx, &step, "value");
    let done = get(cx, &step, "done").to_boolean();
    (value, done)
}

#[test]
fn map_iterator_skips_entries_deleted_mid_iteration() {
    let engine = engine();
    let mut cx = engine.context();
    let map = new_map_with(&engine, &mut cx, &[("a", 1), ("b", 2), ("c", 3)]);

    let iter = call_method(&mut cx, &map, "entries", &[]).unwrap();
    let (first, done) = next(&mut cx, &iter);
    assert!(!done);
    assert_eq!(string_of(&cx.get(&first, &PropertyKey::index(0)).unwrap()), "a");

    call_method(&mut cx, &map, "delete", &[Value::string("b")]).unwrap();

    let (second, done) = next(&mut cx, &iter);
    assert!(!done, "c is still live");
    assert_eq!(string_of(&cx.get(&second, &PropertyKey::index(0)).unwrap()), "c");
    assert_eq!(
        number_of(&cx.get(&second, &PropertyKey::index(1)).unwrap()),
        3.0
    );

    let (_, done) = next(&mut cx, &iter);
    assert!(done);
}

#[test]
fn aliasing_typed_array_views_share_bytes_little_endian() {
    let engine = engine();
    let mut cx = engine.context();
    let buffer_ctor = global(&engine, &mut cx, "ArrayBuffer");
    let buffer = construct(&mut cx, &buffer_ctor, &[Value::int32(8)]).unwrap();

    let int32 = global(&engine, &mut cx, "Int32Array");
    let a = construct(&mut cx, &int32, &[buffer.clone()]).unwrap();
    cx.set(&a, &PropertyKey::index(0), Value::int32(0x0102_0304))
        .unwrap();

    let uint8 = global(&engine, &mut cx, "Uint8Array");
    let b = construct(&mut cx, &uint8, &[buffer]).unwrap();
    assert_eq!(number_of(&cx.get(&b, &PropertyKey::index(0)).unwrap()), 0x04 as f64);
    assert_eq!(number_of(&cx.get(&b, &PropertyKey::index(1)).unwrap()), 0x03 as f64);
    assert_eq!(number_of(&cx.get(&b, &PropertyKey::index(3)).unwrap()), 0x01 as f64);
}

#[test]
fn range_error_instance_shape() {
    let engine = engine();
    let mut cx = engine.context();
    let range_error = global(&engine, &mut cx, "RangeError");
    let error = global(&engine, &mut cx, "Error");

    let e = construct(&mut cx, &range_error, &[Value::string("x")]).unwrap();
    assert_eq!(string_of(&get(&mut cx, &e, "name")), "RangeError");
    assert_eq!(string_of(&get(&mut cx, &e, "message")), "x");

    // e instanceof RangeError and Error, by prototype walk.
    let e_obj = e.as_object().unwrap();
    let range_proto = range_error
        .as_native_function()
        .unwrap()
        .object
        .get_own(&PropertyKey::string("prototype"))
        .unwrap()
        .data_value()
        .unwrap()
        .as_object()
        .unwrap();
    let error_proto = error
        .as_native_function()
        .unwrap()
        .object
        .get_own(&PropertyKey::string("prototype"))
        .unwrap()
        .data_value()
        .unwrap()
        .as_object()
        .unwrap();
    let direct = e_obj.prototype().unwrap();
    assert!(paserati_vm_core::GcRef::ptr_eq(&direct, &range_proto));
    assert!(paserati_vm_core::GcRef::ptr_eq(
        &direct.prototype().unwrap(),
        &error_proto
    ));

    // Error.isError(e)
    let verdict = call_method(&mut cx, &error, "isError", &[e]).unwrap();
    assert_eq!(verdict.as_boolean(), Some(true));

    // Object.getPrototypeOf(RangeError) === Error
    let range_ctor_obj = range_error.as_native_function().unwrap().object.clone();
    let error_ctor_obj = error.as_native_function().unwrap().object.clone();
    assert!(paserati_vm_core::GcRef::ptr_eq(
        &range_ctor_obj.prototype().unwrap(),
        &error_ctor_obj
    ));
}

#[test]
fn pre_aborted_fetch_rejects_without_touching_transport() {
    let (engine, transport) = engine_with_mock();
    let mut cx = engine.context();

    let abort_signal = global(&engine, &mut cx, "AbortSignal");
    let signal = call_method(&mut cx, &abort_signal, "abort", &[Value::string("x")]).unwrap();

    let object_ctor = global(&engine, &mut cx, "Object");
    let init = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&init, &PropertyKey::string("signal"), signal).unwrap();

    let fetch = global(&engine, &mut cx, "fetch");
    let p = cx
        .call(&fetch, &Value::Undefined, &[Value::string("http://nowhere.invalid/"), init])
        .unwrap();

    // Rejected synchronously, before any event-loop turn.
    let promise = p.as_promise().unwrap();
    assert!(promise.is_rejected());
    let reason = promise.reason().unwrap();
    assert!(string_of(&reason).starts_with("AbortError"));

    engine.run_to_completion(&mut cx);
    assert_eq!(transport.request_count(), 0, "no request reached the wire");
}

#[test]
fn aggregate_error_collects_errors_by_identity() {
    let engine = engine();
    let mut cx = engine.context();
    let error_ctor = global(&engine, &mut cx, "Error");
    let original = construct(&mut cx, &error_ctor, &[Value::string("a")]).unwrap();

    let array_ctor = global(&engine, &mut cx, "Array");
    let list = construct(&mut cx, &array_ctor, &[]).unwrap();
    call_method(
        &mut cx,
        &list,
        "push",
        &[original.clone(), Value::string("b")],
    )
    .unwrap();

    let agg_ctor = global(&engine, &mut cx, "AggregateError");
    let agg = construct(&mut cx, &agg_ctor, &[list, Value::string("msg")]).unwrap();

    assert_eq!(string_of(&get(&mut cx, &agg, "name")), "AggregateError");
    assert_eq!(string_of(&get(&mut cx, &agg, "message")), "msg");

    let errors = get(&mut cx, &agg, "errors");
    assert_eq!(number_of(&get(&mut cx, &errors, "length")), 2.0);
    let first = cx.get(&errors, &PropertyKey::index(0)).unwrap();
    assert!(convert::strict_equals(&first, &original), "identity preserved");
    let second = cx.get(&errors, &PropertyKey::index(1)).unwrap();
    assert_eq!(string_of(&second), "b");
}

#[test]
fn map_reset_preserves_insertion_order() {
    let engine = engine();
    let mut cx = engine.context();
    let map_ctor = global(&engine, &mut cx, "Map");
    let map = construct(&mut cx, &map_ctor, &[]).unwrap();

    call_method(&mut cx, &map, "set", &[Value::string("x"), Value::int32(1)]).unwrap();
    call_method(&mut cx, &map, "set", &[Value::string("y"), Value::int32(2)]).unwrap();
    call_method(&mut cx, &map, "set", &[Value::string("x"), Value::int32(3)]).unwrap();

    let iter = call_method(&mut cx, &map, "entries", &[]).unwrap();
    let (first, _) = next(&mut cx, &iter);
    assert_eq!(string_of(&cx.get(&first, &PropertyKey::index(0)).unwrap()), "x");
    assert_eq!(number_of(&cx.get(&first, &PropertyKey::index(1)).unwrap()), 3.0);
    let (second, _) = next(&mut cx, &iter);
    assert_eq!(string_of(&cx.get(&second, &PropertyKey::index(0)).unwrap()), "y");
    let (_, done) = next(&mut cx, &iter);
    assert!(done, "exactly two entries");
}

// Insertions after the cursor are yielded (live append).
#[test]
fn map_iterator_sees_entries_appended_after_creation() {
    let engine = engine();
    let mut cx = engine.context();
    let map = new_map_with(&engine, &mut cx, &[("a", 1)]);

    let iter = call_method(&mut cx, &map, "keys", &[]).unwrap();
    let (first, _) = next(&mut cx, &iter);
    assert_eq!(string_of(&first), "a");

    call_method(&mut cx, &map, "set", &[Value::string("z"), Value::int32(9)]).unwrap();
    let (second, done) = next(&mut cx, &iter);
    assert!(!done);
    assert_eq!(string_of(&second), "z");
}

// A re-key (delete + set) re-appears after the cursor.
#[test]
fn map_iterator_yields_rekeyed_entry_again() {
    let engine = engine();
    let mut cx = engine.context();
    let map = new_map_with(&engine, &mut cx, &[("a", 1), ("b", 2)]);

    let iter = call_method(&mut cx, &map, "keys", &[]).unwrap();
    let (first, _) = next(&mut cx, &iter);
    assert_eq!(string_of(&first), "a");

    call_method(&mut cx, &map, "delete", &[Value::string("a")]).unwrap();
    call_method(&mut cx, &map, "set", &[Value::string("a"), Value::int32(7)]).unwrap();

    let (second, _) = next(&mut cx, &iter);
    assert_eq!(string_of(&second), "b");
    let (third, done) = next(&mut cx, &iter);
    assert!(!done);
    assert_eq!(string_of(&third), "a");
}
