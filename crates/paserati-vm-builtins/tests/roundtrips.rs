//! Round-trip laws.

mod common;

use common::*;
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::{NativeContext, Value};

fn u8_from_bytes(
    engine: &paserati_vm_builtins::engine::Engine,
    cx: &mut NativeContext,
    bytes: &[u8],
) -> Value {
    let ctor = global(engine, cx, "Uint8Array");
    let arr = construct(cx, &ctor, &[Value::int32(bytes.len() as i32)]).unwrap();
    for (i, b) in bytes.iter().enumerate() {
        cx.set(&arr, &PropertyKey::index(i as u32), Value::int32(*b as i32))
            .unwrap();
    }
    arr
}

fn bytes_of(cx: &mut NativeContext, arr: &Value) -> Vec<u8> {
    let len = number_of(&get(cx, arr, "length")) as usize;
    (0..len)
        .map(|i| number_of(&cx.get(arr, &PropertyKey::index(i as u32)).unwrap()) as u8)
        .collect()
}

#[test]
fn hex_round_trips() {
    let engine = engine();
    let mut cx = engine.context();
    let samples: &[&[u8]] = &[b"", b"\x00", b"\xde\xad\xbe\xef", b"hello world", &[0xff; 32]];
    for sample in samples {
        let arr = u8_from_bytes(&engine, &mut cx, sample);
        let hex = call_method(&mut cx, &arr, "toHex", &[]).unwrap();
        let ctor = global(&engine, &mut cx, "Uint8Array");
        let back = call_method(&mut cx, &ctor, "fromHex", &[hex]).unwrap();
        assert_eq!(bytes_of(&mut cx, &back), sample.to_vec());
    }
}

#[test]
fn base64_round_trips() {
    let engine = engine();
    let mut cx = engine.context();
    let samples: &[&[u8]] = &[b"", b"f", b"fo", b"foo", b"\x00\x01\x02\xfd\xfe\xff"];
    for sample in samples {
        let arr = u8_from_bytes(&engine, &mut cx, sample);
        let encoded = call_method(&mut cx, &arr, "toBase64", &[]).unwrap();
        let ctor = global(&engine, &mut cx, "Uint8Array");
        let back = call_method(&mut cx, &ctor, "fromBase64", &[encoded]).unwrap();
        assert_eq!(bytes_of(&mut cx, &back), sample.to_vec(), "sample {sample:?}");
    }
}

#[test]
fn base64_omit_padding_round_trips_loosely() {
    let engine = engine();
    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let options = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(
        &options,
        &PropertyKey::string("omitPadding"),
        Value::boolean(true),
    )
    .unwrap();

    let arr = u8_from_bytes(&engine, &mut cx, b"fo");
    let encoded = call_method(&mut cx, &arr, "toBase64", &[options]).unwrap();
    assert!(!string_of(&encoded).ends_with('='));

    let ctor = global(&engine, &mut cx, "Uint8Array");
    let back = call_method(&mut cx, &ctor, "fromBase64", &[encoded]).unwrap();
    assert_eq!(bytes_of(&mut cx, &back), b"fo".to_vec());
}

#[test]
fn base64url_alphabet() {
    let engine = engine();
    let mut cx = engine.context();
    let object_ctor = global(&engine, &mut cx, "Object");
    let options = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(
        &options,
        &PropertyKey::string("alphabet"),
        Value::string("base64url"),
    )
    .unwrap();

    let arr = u8_from_bytes(&engine, &mut cx, &[0xfb, 0xff]);
    let encoded = call_method(&mut cx, &arr, "toBase64", &[options.clone()]).unwrap();
    let text = string_of(&encoded);
    assert!(!text.contains('+') && !text.contains('/'));

    let ctor = global(&engine, &mut cx, "Uint8Array");
    let back = call_method(&mut cx, &ctor, "fromBase64", &[encoded, options]).unwrap();
    assert_eq!(bytes_of(&mut cx, &back), vec![0xfb, 0xff]);
}

#[test]
fn set_from_hex_reports_read_and_written() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Uint8Array");
    let arr = construct(&mut cx, &ctor, &[Value::int32(2)]).unwrap();
    let result =
        call_method(&mut cx, &arr, "setFromHex", &[Value::string("aabbcc")]).unwrap();
    // Capacity is two bytes; two bytes written, four characters read.
    assert_eq!(number_of(&get(&mut cx, &result, "written")), 2.0);
    assert_eq!(number_of(&get(&mut cx, &result, "read")), 4.0);
    assert_eq!(bytes_of(&mut cx, &arr), vec![0xaa, 0xbb]);
}

#[test]
fn malformed_codecs_are_syntax_errors() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Uint8Array");
    let odd = call_method(&mut cx, &ctor, "fromHex", &[Value::string("abc")]);
    assert!(matches!(odd, Err(paserati_vm_core::VmError::SyntaxError(_))));
    let bad = call_method(&mut cx, &ctor, "fromHex", &[Value::string("zz")]);
    assert!(matches!(bad, Err(paserati_vm_core::VmError::SyntaxError(_))));
    let bad64 = call_method(&mut cx, &ctor, "fromBase64", &[Value::string("!!!!")]);
    assert!(matches!(bad64, Err(paserati_vm_core::VmError::SyntaxError(_))));
}

#[test]
fn json_round_trip_is_structural() {
    let engine = engine();
    let mut cx = engine.context();
    let json = global(&engine, &mut cx, "JSON");

    let object_ctor = global(&engine, &mut cx, "Object");
    let value = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&value, &PropertyKey::string("n"), Value::Float(1.5))
        .unwrap();
    cx.set(&value, &PropertyKey::string("s"), Value::string("hi"))
        .unwrap();
    cx.set(&value, &PropertyKey::string("b"), Value::boolean(true))
        .unwrap();
    cx.set(&value, &PropertyKey::string("z"), Value::Null).unwrap();
    // An undefined property is dropped by stringify.
    cx.set(&value, &PropertyKey::string("gone"), Value::Undefined)
        .unwrap();
    let array_ctor = global(&engine, &mut cx, "Array");
    let list = construct(&mut cx, &array_ctor, &[]).unwrap();
    call_method(&mut cx, &list, "push", &[Value::int32(1), Value::int32(2)]).unwrap();
    cx.set(&value, &PropertyKey::string("list"), list).unwrap();

    let text = call_method(&mut cx, &json, "stringify", &[value]).unwrap();
    let parsed = call_method(&mut cx, &json, "parse", &[text]).unwrap();

    assert_eq!(number_of(&get(&mut cx, &parsed, "n")), 1.5);
    assert_eq!(string_of(&get(&mut cx, &parsed, "s")), "hi");
    assert_eq!(get(&mut cx, &parsed, "b").as_boolean(), Some(true));
    assert!(get(&mut cx, &parsed, "z").is_null());
    assert!(get(&mut cx, &parsed, "gone").is_undefined());
    let list = get(&mut cx, &parsed, "list");
    assert_eq!(number_of(&get(&mut cx, &list, "length")), 2.0);
    assert_eq!(
        number_of(&cx.get(&list, &PropertyKey::index(1)).unwrap()),
        2.0
    );
}

#[test]
fn json_stringify_drops_unserializable_roots() {
    let engine = engine();
    let mut cx = engine.context();
    let json = global(&engine, &mut cx, "JSON");
    let result = call_method(&mut cx, &json, "stringify", &[Value::Undefined]).unwrap();
    assert!(result.is_undefined());
}

#[test]
fn json_cycles_are_type_errors() {
    let engine = engine();
    let mut cx = engine.context();
    let json = global(&engine, &mut cx, "JSON");
    let object_ctor = global(&engine, &mut cx, "Object");
    let value = construct(&mut cx, &object_ctor, &[]).unwrap();
    cx.set(&value, &PropertyKey::string("me"), value.clone())
        .unwrap();
    let err = call_method(&mut cx, &json, "stringify", &[value]).unwrap_err();
    assert!(matches!(err, paserati_vm_core::VmError::TypeError(_)));
}

#[test]
fn typed_array_copy_constructor_round_trips() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Int16Array");
    let src = construct(&mut cx, &ctor, &[Value::int32(3)]).unwrap();
    for (i, v) in [-5, 0, 1234].iter().enumerate() {
        cx.set(&src, &PropertyKey::index(i as u32), Value::int32(*v))
            .unwrap();
    }
    let copy = construct(&mut cx, &ctor, &[src.clone()]).unwrap();
    for i in 0..3u32 {
        let a = cx.get(&src, &PropertyKey::index(i)).unwrap();
        let b = cx.get(&copy, &PropertyKey::index(i)).unwrap();
        assert_eq!(a.as_number(), b.as_number());
    }

    // A copy does not alias the source buffer.
    cx.set(&copy, &PropertyKey::index(0), Value::int32(9)).unwrap();
    assert_eq!(
        number_of(&cx.get(&src, &PropertyKey::index(0)).unwrap()),
        -5.0
    );
}

#[test]
fn subarray_aliases_but_slice_copies() {
    let engine = engine();
    let mut cx = engine.context();
    let ctor = global(&engine, &mut cx, "Uint8Array");
    let src = construct(&mut cx, &ctor, &[Value::int32(4)]).unwrap();
    cx.set(&src, &PropertyKey::index(2), Value::int32(7)).unwrap();

    let view = call_method(&mut cx, &src, "subarray", &[Value::int32(2)]).unwrap();
    let copy = call_method(&mut cx, &src, "slice", &[Value::int32(2)]).unwrap();

    cx.set(&src, &PropertyKey::index(2), Value::int32(9)).unwrap();
    assert_eq!(number_of(&cx.get(&view, &PropertyKey::index(0)).unwrap()), 9.0);
    assert_eq!(number_of(&cx.get(&copy, &PropertyKey::index(0)).unwrap()), 7.0);
}
