//! The typed-array family.
//!
//! The abstract `%TypedArray%` constructor throws when invoked and exists to
//! carry the shared prototype; each concrete constructor (`Int8Array` …
//! `BigUint64Array`) chains its prototype through `%TypedArray%.prototype`
//! and itself through `%TypedArray%`, so
//! `Object.getPrototypeOf(Int32Array) === TypedArray`.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert;
use paserati_vm_core::object::{JsObject, PropertyAttributes, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::typed_array::{BufferRef, JsTypedArray, TypedArrayKind};
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, require_callable};
use crate::iterator::{IterationKind, new_index_iterator};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

/// The abstract `%TypedArray%` intrinsic.
pub struct AbstractTypedArrayBuiltin;

impl Builtin for AbstractTypedArrayBuiltin {
    fn name(&self) -> &'static str {
        "TypedArray"
    }

    fn priority(&self) -> u32 {
        priority::TYPED_ARRAY
    }

    fn init_types(&self, _tcx: &mut dyn TypeContext) {
        // %TypedArray% is not a global binding; only the concrete
        // constructors surface in the type environment.
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let iterator_sym = well_known_symbols().iterator.clone();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "TypedArray")
            .constructor_fn(
                |_this, _args, _cx| {
                    Err(VmError::type_error(
                        "Abstract class TypedArray not directly constructable",
                    ))
                },
                0,
            )
            .accessor("buffer", ta_buffer)
            .accessor("byteLength", ta_byte_length)
            .accessor("byteOffset", ta_byte_offset)
            .accessor("length", ta_length)
            .method("at", ta_at, 1)
            .method("indexOf", ta_index_of, 1)
            .method("lastIndexOf", ta_last_index_of, 1)
            .method("includes", ta_includes, 1)
            .method("join", ta_join, 1)
            .method("toString", ta_to_string, 0)
            .method("toLocaleString", ta_to_string, 0)
            .method("reverse", ta_reverse, 0)
            .method("forEach", ta_for_each, 1)
            .method("every", ta_every, 1)
            .method("some", ta_some, 1)
            .method("find", ta_find, 1)
            .method("findIndex", ta_find_index, 1)
            .method("filter", ta_filter, 1)
            .method("map", ta_map, 1)
            .method("reduce", ta_reduce, 1)
            .method("reduceRight", ta_reduce_right, 1)
            .method("copyWithin", ta_copy_within, 2)
            .method("fill", ta_fill, 1)
            .method("sort", ta_sort, 1)
            .method("set", ta_set, 1)
            .method("subarray", ta_subarray, 2)
            .method("slice", ta_slice, 2)
            .method("entries", |this, _a, cx| ta_iterate(this, cx, IterationKind::Entries), 0)
            .method("keys", |this, _a, cx| ta_iterate(this, cx, IterationKind::Keys), 0)
            .method("values", |this, _a, cx| ta_iterate(this, cx, IterationKind::Values), 0)
            .symbol_method(iterator_sym, "Symbol.iterator", |this, _a, cx| {
                ta_iterate(this, cx, IterationKind::Values)
            }, 0)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::TYPED_ARRAY, ctor);
        rcx.set_intrinsic(intrinsic_keys::TYPED_ARRAY_PROTOTYPE, Value::object(proto));
        Ok(())
    }
}

/// One concrete typed-array constructor.
pub struct ConcreteTypedArrayBuiltin {
    kind: TypedArrayKind,
    index: u32,
}

/// All eleven concrete constructors, in kind order.
pub fn concrete_builtins() -> Vec<Box<dyn Builtin>> {
    TypedArrayKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            Box::new(ConcreteTypedArrayBuiltin {
                kind: *kind,
                index: i as u32,
            }) as Box<dyn Builtin>
        })
        .collect()
}

impl Builtin for ConcreteTypedArrayBuiltin {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn priority(&self) -> u32 {
        priority::TYPED_ARRAYS_BASE + self.index
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let element = if self.kind.is_bigint() {
            Type::BigInt
        } else {
            Type::Number
        };
        let instance = Type::Object(vec![
            ("length".into(), Type::Number),
            ("byteLength".into(), Type::Number),
            ("byteOffset".into(), Type::Number),
            ("buffer".into(), Type::named("ArrayBuffer")),
            ("at".into(), Type::function(vec![Type::Number], element)),
        ]);
        tcx.define_type_alias(self.kind.name(), instance.clone());
        tcx.define_global(
            self.kind.name(),
            Type::ctor(vec![Type::union(vec![Type::Number, Type::Any])], instance),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let kind = self.kind;
        let shared_proto = rcx.intrinsic_object(intrinsic_keys::TYPED_ARRAY_PROTOTYPE)?;
        let abstract_ctor = realm
            .intrinsic(intrinsic_keys::TYPED_ARRAY)
            .ok_or_else(|| VmError::internal("%TypedArray% not installed"))?;
        let abstract_ctor_object = abstract_ctor
            .as_native_function()
            .ok_or_else(|| VmError::internal("%TypedArray% is not callable"))?
            .object
            .clone();

        let bpe = Value::number(kind.element_size() as f64);
        let mut builder = BuiltInBuilder::new(&realm, kind.name())
            .inherits(shared_proto)
            .constructor_inherits(abstract_ctor_object)
            .constructor_fn(
                move |this, args, cx| concrete_constructor(this, args, cx, kind),
                3,
            )
            .property(
                PropertyKey::string("BYTES_PER_ELEMENT"),
                bpe.clone(),
                PropertyAttributes::frozen(),
            )
            .static_property(
                PropertyKey::string("BYTES_PER_ELEMENT"),
                bpe,
                PropertyAttributes::frozen(),
            );

        if kind == TypedArrayKind::Uint8 {
            builder = builder
                .method("toBase64", u8_to_base64, 0)
                .method("toHex", u8_to_hex, 0)
                .method("setFromBase64", u8_set_from_base64, 1)
                .method("setFromHex", u8_set_from_hex, 1)
                .static_method("fromBase64", u8_from_base64, 1)
                .static_method("fromHex", u8_from_hex, 1);
        }

        let (ctor, proto) = builder.build_with_statics();
        rcx.set_intrinsic(
            intrinsic_keys::typed_array_prototype(kind.name()),
            Value::object(proto),
        );
        rcx.define_global(kind.name(), ctor);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

fn prototype_for(cx: &mut NativeContext, kind: TypedArrayKind) -> VmResult<Option<GcRef<JsObject>>> {
    let slot = intrinsic_keys::typed_array_prototype(kind.name());
    if cx.is_constructor_call() {
        let target = cx.new_target().clone();
        cx.get_prototype_from_constructor(&target, &slot)
    } else {
        Ok(cx.current_realm().intrinsic_object(&slot))
    }
}

/// Fresh same-kind array over a new buffer, with realm-correct prototypes.
fn new_of_kind(realm: &Realm, kind: TypedArrayKind, length: usize) -> GcRef<JsTypedArray> {
    let proto = realm.intrinsic_object(&intrinsic_keys::typed_array_prototype(kind.name()));
    let buffer_proto = realm.intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
    JsTypedArray::with_length(kind, length, proto, buffer_proto)
}

/// ToIndex with a RangeError for negatives and non-integers.
fn to_index(cx: &mut NativeContext, value: &Value, what: &str) -> VmResult<usize> {
    let n = cx.to_number(value)?;
    if n.is_nan() {
        return Ok(0);
    }
    if n < 0.0 || n.fract() != 0.0 || !n.is_finite() {
        return Err(VmError::range_error(format!("Invalid typed array {what}")));
    }
    Ok(n as usize)
}

/// Write `value` into element `index`, applying the element kind's coercion.
/// `from_numbers` permits integer-valued numbers into BigInt kinds, which is
/// only allowed during construction from a plain list.
fn write_element(
    cx: &mut NativeContext,
    ta: &GcRef<JsTypedArray>,
    index: usize,
    value: &Value,
    from_numbers: bool,
) -> VmResult<()> {
    if ta.kind().is_bigint() {
        if let Some(b) = value.as_bigint() {
            ta.set_bigint(index, b);
            return Ok(());
        }
        if from_numbers {
            if let Some(n) = value.as_number() {
                if n.fract() == 0.0 {
                    ta.set_bigint(index, &paserati_vm_core::bigint::JsBigInt::from_i64(n as i64));
                    return Ok(());
                }
            }
        }
        return Err(VmError::type_error(
            "Cannot convert a non-BigInt value to a BigInt element",
        ));
    }
    let n = cx.to_number(value)?;
    ta.set_f64(index, n);
    Ok(())
}

fn concrete_constructor(
    _this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
    kind: TypedArrayKind,
) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error(format!(
            "Constructor {} requires 'new'",
            kind.name()
        )));
    }
    let proto = prototype_for(cx, kind)?;
    let object = JsObject::alloc(proto);

    let first = arg(args, 0);
    match first {
        // (length)
        Value::Undefined => {
            Ok(Value::TypedArray(attach(object, kind, cx, 0)?))
        }
        v if v.is_number() => {
            let length = to_index(cx, v, "length")?;
            Ok(Value::TypedArray(attach(object, kind, cx, length)?))
        }
        // (buffer, byteOffset?, length?)
        Value::ArrayBuffer(buffer) => {
            let buffer_ref = BufferRef::Plain(buffer.clone());
            view_over(cx, object, kind, buffer_ref, args)
        }
        Value::SharedArrayBuffer(buffer) => {
            let buffer_ref = BufferRef::Shared(buffer.clone());
            view_over(cx, object, kind, buffer_ref, args)
        }
        // (typedArray)
        Value::TypedArray(source) => {
            let length = source.length();
            let ta = attach(object, kind, cx, length)?;
            if source.kind() == kind {
                if let Some(bytes) = source.bytes() {
                    ta.write_bytes(0, &bytes);
                }
            } else if source.kind().is_bigint() != kind.is_bigint() {
                return Err(VmError::type_error(
                    "Cannot mix BigInt and non-BigInt typed arrays",
                ));
            } else {
                for i in 0..length {
                    let element = source.get(i).unwrap_or(Value::Undefined);
                    write_element(cx, &ta, i, &element, false)?;
                }
            }
            Ok(Value::TypedArray(ta))
        }
        // (array-or-iterable)
        other => {
            let items = cx.iterable_to_array(other)?;
            let ta = attach(object, kind, cx, items.len())?;
            for (i, item) in items.iter().enumerate() {
                write_element(cx, &ta, i, item, true)?;
            }
            Ok(Value::TypedArray(ta))
        }
    }
}

/// Allocate the view and its backing buffer for the `(length)` signature.
fn attach(
    object: GcRef<JsObject>,
    kind: TypedArrayKind,
    cx: &mut NativeContext,
    length: usize,
) -> VmResult<GcRef<JsTypedArray>> {
    let buffer_proto = cx
        .current_realm()
        .intrinsic_object(intrinsic_keys::ARRAY_BUFFER_PROTOTYPE);
    let buffer = paserati_vm_core::array_buffer::JsArrayBuffer::new(
        length * kind.element_size(),
        buffer_proto,
    );
    JsTypedArray::new(object, BufferRef::Plain(buffer), kind, 0, length)
        .map_err(VmError::range_error)
}

fn view_over(
    cx: &mut NativeContext,
    object: GcRef<JsObject>,
    kind: TypedArrayKind,
    buffer: BufferRef,
    args: &[Value],
) -> VmResult<Value> {
    let element_size = kind.element_size();
    let byte_offset = match arg(args, 1) {
        Value::Undefined => 0,
        v => to_index(cx, v, "byteOffset")?,
    };
    if byte_offset % element_size != 0 {
        return Err(VmError::range_error(format!(
            "Start offset of {} should be a multiple of {element_size}",
            kind.name()
        )));
    }
    let buffer_length = buffer.byte_length();
    let length = match arg(args, 2) {
        Value::Undefined => {
            if byte_offset > buffer_length {
                return Err(VmError::range_error("Start offset is outside the bounds of the buffer"));
            }
            let remaining = buffer_length - byte_offset;
            if remaining % element_size != 0 {
                return Err(VmError::range_error(format!(
                    "Byte length of {} should be a multiple of {element_size}",
                    kind.name()
                )));
            }
            remaining / element_size
        }
        v => to_index(cx, v, "length")?,
    };
    let ta = JsTypedArray::new(object, buffer, kind, byte_offset, length)
        .map_err(VmError::range_error)?;
    Ok(Value::TypedArray(ta))
}

// ---------------------------------------------------------------------------
// Receiver plumbing
// ---------------------------------------------------------------------------

fn this_typed_array(this: &Value, what: &str) -> VmResult<GcRef<JsTypedArray>> {
    this.as_typed_array()
        .cloned()
        .ok_or_else(|| VmError::type_error(format!("{what} requires a typed array receiver")))
}

fn require_attached(ta: &GcRef<JsTypedArray>, what: &str) -> VmResult<()> {
    if ta.is_detached() {
        return Err(VmError::type_error(format!(
            "{what} called on a typed array over a detached buffer"
        )));
    }
    Ok(())
}

fn elements_of(ta: &GcRef<JsTypedArray>) -> Vec<Value> {
    (0..ta.length())
        .map(|i| ta.get(i).unwrap_or(Value::Undefined))
        .collect()
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

fn ta_buffer(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "get buffer")?;
    Ok(ta.buffer().as_value())
}

fn ta_byte_length(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "get byteLength")?;
    Ok(Value::number(ta.byte_length() as f64))
}

fn ta_byte_offset(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "get byteOffset")?;
    Ok(Value::number(ta.byte_offset() as f64))
}

fn ta_length(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "get length")?;
    Ok(Value::number(ta.length() as f64))
}

// ---------------------------------------------------------------------------
// Shared methods
// ---------------------------------------------------------------------------

fn ta_iterate(this: &Value, cx: &mut NativeContext, kind: IterationKind) -> VmResult<Value> {
    this_typed_array(this, "typed array iterator")?;
    new_index_iterator(&cx.current_realm(), this.clone(), kind)
}

fn ta_at(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "at")?;
    let len = ta.length() as f64;
    let rel = cx.to_integer_or_infinity(arg(args, 0))?;
    let idx = if rel < 0.0 { len + rel } else { rel };
    if idx < 0.0 || idx >= len {
        return Ok(Value::Undefined);
    }
    Ok(ta.get(idx as usize).unwrap_or(Value::Undefined))
}

fn ta_index_of(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "indexOf")?;
    let needle = arg(args, 0);
    for (i, item) in elements_of(&ta).iter().enumerate() {
        if convert::strict_equals(item, needle) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::int32(-1))
}

fn ta_last_index_of(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "lastIndexOf")?;
    let needle = arg(args, 0);
    for (i, item) in elements_of(&ta).iter().enumerate().rev() {
        if convert::strict_equals(item, needle) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::int32(-1))
}

fn ta_includes(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "includes")?;
    let needle = arg(args, 0);
    Ok(Value::boolean(
        elements_of(&ta)
            .iter()
            .any(|item| convert::same_value_zero(item, needle)),
    ))
}

fn ta_join(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "join")?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => cx.to_string_value(other)?.as_str().to_string(),
    };
    let mut parts = Vec::with_capacity(ta.length());
    for item in elements_of(&ta) {
        parts.push(cx.to_string_value(&item)?.as_str().to_string());
    }
    Ok(Value::string(parts.join(&separator)))
}

fn ta_to_string(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    ta_join(this, &[], cx)
}

fn ta_reverse(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "reverse")?;
    require_attached(&ta, "reverse")?;
    let mut items = elements_of(&ta);
    items.reverse();
    for (i, item) in items.iter().enumerate() {
        write_element(cx, &ta, i, item, false)?;
    }
    Ok(this.clone())
}

fn ta_callback_loop<F>(
    this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
    what: &str,
    mut f: F,
) -> VmResult<()>
where
    F: FnMut(&mut NativeContext, Value, usize) -> VmResult<bool>,
{
    let ta = this_typed_array(this, what)?;
    require_callable(arg(args, 0), what)?;
    for i in 0..ta.length() {
        let item = ta.get(i).unwrap_or(Value::Undefined);
        if !f(cx, item, i)? {
            break;
        }
    }
    Ok(())
}

fn ta_call(
    cx: &mut NativeContext,
    callback: &Value,
    this_arg: &Value,
    item: Value,
    index: usize,
    target: &Value,
) -> VmResult<Value> {
    cx.call(
        callback,
        this_arg,
        &[item, Value::number(index as f64), target.clone()],
    )
}

fn ta_for_each(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    ta_callback_loop(this, args, cx, "forEach", |cx, item, i| {
        ta_call(cx, &callback, &this_arg, item, i, this)?;
        Ok(true)
    })?;
    Ok(Value::Undefined)
}

fn ta_every(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut all = true;
    ta_callback_loop(this, args, cx, "every", |cx, item, i| {
        if !ta_call(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            all = false;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::boolean(all))
}

fn ta_some(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut any = false;
    ta_callback_loop(this, args, cx, "some", |cx, item, i| {
        if ta_call(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            any = true;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::boolean(any))
}

fn ta_find(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut found = Value::Undefined;
    ta_callback_loop(this, args, cx, "find", |cx, item, i| {
        if ta_call(cx, &callback, &this_arg, item.clone(), i, this)?.to_boolean() {
            found = item;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

fn ta_find_index(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut found = -1i64;
    ta_callback_loop(this, args, cx, "findIndex", |cx, item, i| {
        if ta_call(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            found = i as i64;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::number(found as f64))
}

fn ta_filter(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "filter")?;
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut kept = Vec::new();
    ta_callback_loop(this, args, cx, "filter", |cx, item, i| {
        if ta_call(cx, &callback, &this_arg, item.clone(), i, this)?.to_boolean() {
            kept.push(item);
        }
        Ok(true)
    })?;
    let out = new_of_kind(&cx.current_realm(), ta.kind(), kept.len());
    for (i, item) in kept.iter().enumerate() {
        write_element(cx, &out, i, item, false)?;
    }
    Ok(Value::TypedArray(out))
}

fn ta_map(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "map")?;
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let out = new_of_kind(&cx.current_realm(), ta.kind(), ta.length());
    ta_callback_loop(this, args, cx, "map", |cx, item, i| {
        let mapped = ta_call(cx, &callback, &this_arg, item, i, this)?;
        write_element(cx, &out, i, &mapped, false)?;
        Ok(true)
    })?;
    Ok(Value::TypedArray(out))
}

fn ta_reduce(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "reduce")?;
    let callback = require_callable(arg(args, 0), "reduce callback")?;
    let items = elements_of(&ta);
    let mut iter = items.into_iter().enumerate();
    let mut acc = if args.len() > 1 {
        arg(args, 1).clone()
    } else {
        match iter.next() {
            Some((_, first)) => first,
            None => {
                return Err(VmError::type_error(
                    "Reduce of empty typed array with no initial value",
                ));
            }
        }
    };
    for (i, item) in iter {
        acc = cx.call(
            &callback,
            &Value::Undefined,
            &[acc, item, Value::number(i as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn ta_reduce_right(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "reduceRight")?;
    let callback = require_callable(arg(args, 0), "reduceRight callback")?;
    let items = elements_of(&ta);
    let mut iter = items.into_iter().enumerate().rev();
    let mut acc = if args.len() > 1 {
        arg(args, 1).clone()
    } else {
        match iter.next() {
            Some((_, last)) => last,
            None => {
                return Err(VmError::type_error(
                    "Reduce of empty typed array with no initial value",
                ));
            }
        }
    };
    for (i, item) in iter {
        acc = cx.call(
            &callback,
            &Value::Undefined,
            &[acc, item, Value::number(i as f64), this.clone()],
        )?;
    }
    Ok(acc)
}

fn ta_copy_within(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "copyWithin")?;
    require_attached(&ta, "copyWithin")?;
    let len = ta.length();
    let target = convert::relative_index(cx.to_number(arg(args, 0))?, len);
    let start = convert::relative_index(cx.to_number(arg(args, 1)).unwrap_or(0.0), len);
    let end = match arg(args, 2) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    let count = end.saturating_sub(start).min(len - target);
    if count > 0 {
        let items = elements_of(&ta);
        for offset in 0..count {
            write_element(cx, &ta, target + offset, &items[start + offset], false)?;
        }
    }
    Ok(this.clone())
}

fn ta_fill(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "fill")?;
    require_attached(&ta, "fill")?;
    let len = ta.length();
    let value = arg(args, 0).clone();
    let start = convert::relative_index(cx.to_number(arg(args, 1)).unwrap_or(0.0), len);
    let end = match arg(args, 2) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    for i in start..end {
        write_element(cx, &ta, i, &value, false)?;
    }
    Ok(this.clone())
}

fn ta_sort(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "sort")?;
    require_attached(&ta, "sort")?;
    let comparator = arg(args, 0).clone();
    if !comparator.is_undefined() && !comparator.is_callable() {
        return Err(VmError::type_error("The comparison function must be callable"));
    }
    let mut items = elements_of(&ta);

    if comparator.is_undefined() {
        // Default order is numeric ascending with NaN last.
        items.sort_by(|a, b| {
            let x = a.as_number().unwrap_or(f64::NAN);
            let y = b.as_number().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or_else(|| {
                if x.is_nan() && y.is_nan() {
                    std::cmp::Ordering::Equal
                } else if x.is_nan() {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                }
            })
        });
    } else {
        // A comparator can throw; collect the verdicts first.
        let mut error = None;
        items.sort_by(|a, b| {
            if error.is_some() {
                return std::cmp::Ordering::Equal;
            }
            match cx.call(&comparator, &Value::Undefined, &[a.clone(), b.clone()]) {
                Ok(result) => {
                    let n = result.as_number().unwrap_or(0.0);
                    if n < 0.0 {
                        std::cmp::Ordering::Less
                    } else if n > 0.0 {
                        std::cmp::Ordering::Greater
                    } else {
                        std::cmp::Ordering::Equal
                    }
                }
                Err(e) => {
                    error = Some(e);
                    std::cmp::Ordering::Equal
                }
            }
        });
        if let Some(e) = error {
            return Err(e);
        }
    }

    for (i, item) in items.iter().enumerate() {
        write_element(cx, &ta, i, item, false)?;
    }
    Ok(this.clone())
}

fn ta_set(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "set")?;
    require_attached(&ta, "set")?;
    let offset = match arg(args, 1) {
        Value::Undefined => 0,
        other => to_index(cx, other, "offset")?,
    };
    let source = arg(args, 0).clone();
    let items: Vec<Value> = match &source {
        Value::TypedArray(src) => elements_of(src),
        other => cx.iterable_to_array(other)?,
    };
    if offset + items.len() > ta.length() {
        return Err(VmError::range_error("Source is too large for this typed array"));
    }
    for (i, item) in items.iter().enumerate() {
        write_element(cx, &ta, offset + i, item, false)?;
    }
    Ok(Value::Undefined)
}

fn ta_subarray(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "subarray")?;
    let len = ta.length();
    let begin = convert::relative_index(cx.to_number(arg(args, 0)).unwrap_or(0.0), len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    let proto = cx
        .current_realm()
        .intrinsic_object(&intrinsic_keys::typed_array_prototype(ta.kind().name()));
    let view = ta
        .subarray(JsObject::alloc(proto), begin, end)
        .map_err(VmError::range_error)?;
    Ok(Value::TypedArray(view))
}

fn ta_slice(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let ta = this_typed_array(this, "slice")?;
    require_attached(&ta, "slice")?;
    let len = ta.length();
    let begin = convert::relative_index(cx.to_number(arg(args, 0)).unwrap_or(0.0), len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    let end = end.max(begin);
    let out = new_of_kind(&cx.current_realm(), ta.kind(), end - begin);
    for i in begin..end {
        let item = ta.get(i).unwrap_or(Value::Undefined);
        write_element(cx, &out, i - begin, &item, false)?;
    }
    Ok(Value::TypedArray(out))
}

// ---------------------------------------------------------------------------
// Uint8Array base64 / hex (ES2024)
// ---------------------------------------------------------------------------

struct Base64Options {
    url_alphabet: bool,
    omit_padding: bool,
}

/// Options are read before any detached-buffer check; the order of these
/// side effects is observable through getters on the options object.
fn read_base64_options(cx: &mut NativeContext, options: &Value) -> VmResult<Base64Options> {
    if options.is_undefined() {
        return Ok(Base64Options {
            url_alphabet: false,
            omit_padding: false,
        });
    }
    if !options.is_object() {
        return Err(VmError::type_error("Options must be an object"));
    }
    let alphabet = cx.get(options, &PropertyKey::string("alphabet"))?;
    let url_alphabet = match &alphabet {
        Value::Undefined => false,
        other => match other.as_string().map(|s| s.as_str().to_string()).as_deref() {
            Some("base64") => false,
            Some("base64url") => true,
            _ => {
                return Err(VmError::type_error(
                    "alphabet must be \"base64\" or \"base64url\"",
                ));
            }
        },
    };
    let omit_padding = cx
        .get(options, &PropertyKey::string("omitPadding"))?
        .to_boolean();
    Ok(Base64Options {
        url_alphabet,
        omit_padding,
    })
}

fn u8_bytes(this: &Value, what: &str) -> VmResult<(GcRef<JsTypedArray>, Vec<u8>)> {
    let ta = this_typed_array(this, what)?;
    if ta.kind() != TypedArrayKind::Uint8 {
        return Err(VmError::type_error(format!(
            "{what} requires a Uint8Array receiver"
        )));
    }
    let bytes = ta
        .bytes()
        .ok_or_else(|| VmError::type_error(format!("{what} called on a detached buffer")))?;
    Ok((ta, bytes))
}

fn u8_to_base64(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    // Options first, detach check second.
    let options = read_base64_options(cx, arg(args, 0))?;
    let (_, bytes) = u8_bytes(this, "toBase64")?;
    let encoded = match (options.url_alphabet, options.omit_padding) {
        (false, false) => STANDARD.encode(&bytes),
        (false, true) => STANDARD_NO_PAD.encode(&bytes),
        (true, false) => URL_SAFE.encode(&bytes),
        (true, true) => URL_SAFE_NO_PAD.encode(&bytes),
    };
    Ok(Value::string(encoded))
}

fn u8_to_hex(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let (_, bytes) = u8_bytes(this, "toHex")?;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in &bytes {
        out.push_str(&format!("{b:02x}"));
    }
    Ok(Value::string(out))
}

/// Loose decode: whitespace stripped, padding optional.
fn decode_base64(input: &str, url_alphabet: bool) -> VmResult<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let padded = cleaned.ends_with('=');
    let result = match (url_alphabet, padded) {
        (false, true) => STANDARD.decode(&cleaned),
        (false, false) => STANDARD_NO_PAD.decode(&cleaned),
        (true, true) => URL_SAFE.decode(&cleaned),
        (true, false) => URL_SAFE_NO_PAD.decode(&cleaned),
    };
    result.map_err(|e| VmError::syntax_error(format!("Invalid base64: {e}")))
}

fn decode_hex(input: &str) -> VmResult<Vec<u8>> {
    if input.len() % 2 != 0 {
        return Err(VmError::syntax_error("Hex string must have an even length"));
    }
    let mut out = Vec::with_capacity(input.len() / 2);
    let chars: Vec<char> = input.chars().collect();
    for pair in chars.chunks(2) {
        let hi = pair[0]
            .to_digit(16)
            .ok_or_else(|| VmError::syntax_error("Invalid hex digit"))?;
        let lo = pair[1]
            .to_digit(16)
            .ok_or_else(|| VmError::syntax_error("Invalid hex digit"))?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

fn u8_from_base64(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(text) = arg(args, 0).as_string().cloned() else {
        return Err(VmError::type_error("fromBase64 expects a string"));
    };
    let options = read_base64_options(cx, arg(args, 1))?;
    let bytes = decode_base64(text.as_str(), options.url_alphabet)?;
    let out = new_of_kind(&cx.current_realm(), TypedArrayKind::Uint8, bytes.len());
    out.write_bytes(0, &bytes);
    Ok(Value::TypedArray(out))
}

fn u8_from_hex(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(text) = arg(args, 0).as_string().cloned() else {
        return Err(VmError::type_error("fromHex expects a string"));
    };
    let bytes = decode_hex(text.as_str())?;
    let out = new_of_kind(&cx.current_realm(), TypedArrayKind::Uint8, bytes.len());
    out.write_bytes(0, &bytes);
    Ok(Value::TypedArray(out))
}

/// `{ read, written }` result object for the set-from codecs.
fn read_written(cx: &mut NativeContext, read: usize, written: usize) -> Value {
    let obj = crate::helpers::new_plain_object(&cx.current_realm());
    obj.set_own(PropertyKey::string("read"), Value::number(read as f64));
    obj.set_own(PropertyKey::string("written"), Value::number(written as f64));
    Value::object(obj)
}

fn u8_set_from_base64(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(text) = arg(args, 0).as_string().cloned() else {
        return Err(VmError::type_error("setFromBase64 expects a string"));
    };
    // Options before the detach check.
    let options = read_base64_options(cx, arg(args, 1))?;
    let (ta, _) = u8_bytes(this, "setFromBase64")?;

    let decoded = decode_base64(text.as_str(), options.url_alphabet)?;
    let capacity = ta.length();
    let written = decoded.len().min(capacity);
    ta.write_bytes(0, &decoded[..written]);

    // Characters consumed for the bytes actually written: whole groups of
    // four cover three bytes each.
    let cleaned_len = text
        .as_str()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .count();
    let read = if written == decoded.len() {
        cleaned_len
    } else {
        written.div_ceil(3) * 4
    };
    Ok(read_written(cx, read, written))
}

fn u8_set_from_hex(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let Some(text) = arg(args, 0).as_string().cloned() else {
        return Err(VmError::type_error("setFromHex expects a string"));
    };
    let (ta, _) = u8_bytes(this, "setFromHex")?;
    let decoded = decode_hex(text.as_str())?;
    let written = decoded.len().min(ta.length());
    ta.write_bytes(0, &decoded[..written]);
    Ok(read_written(cx, written * 2, written))
}
