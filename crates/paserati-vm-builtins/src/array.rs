//! The `Array` builtin.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array, require_callable};
use crate::iterator::{IterationKind, new_index_iterator};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct ArrayBuiltin;

impl Builtin for ArrayBuiltin {
    fn name(&self) -> &'static str {
        "Array"
    }

    fn priority(&self) -> u32 {
        priority::ARRAY
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global(
            "Array",
            Type::ctor(vec![Type::Number], Type::Array(Box::new(Type::Any))),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let iterator_sym = well_known_symbols().iterator.clone();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "Array")
            .constructor_fn(array_constructor, 1)
            .method("push", array_push, 1)
            .method("pop", array_pop, 0)
            .method("indexOf", array_index_of, 1)
            .method("includes", array_includes, 1)
            .method("join", array_join, 1)
            .method("slice", array_slice, 2)
            .method("concat", array_concat, 1)
            .method("forEach", array_for_each, 1)
            .method("map", array_map, 1)
            .method("filter", array_filter, 1)
            .method("find", array_find, 1)
            .method("findIndex", array_find_index, 1)
            .method("every", array_every, 1)
            .method("some", array_some, 1)
            .method("reduce", array_reduce, 1)
            .method("keys", |this, _a, cx| iterate(this, cx, IterationKind::Keys), 0)
            .method("values", |this, _a, cx| iterate(this, cx, IterationKind::Values), 0)
            .method("entries", |this, _a, cx| iterate(this, cx, IterationKind::Entries), 0)
            .method("toString", array_to_string, 0)
            .symbol_method(iterator_sym, "Symbol.iterator", |this, _a, cx| {
                iterate(this, cx, IterationKind::Values)
            }, 0)
            .static_method("isArray", |_t, args, _cx| {
                Ok(Value::boolean(arg(args, 0).is_array()))
            }, 1)
            .static_method("of", array_of, 0)
            .static_method("from", array_from, 1)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::ARRAY_PROTOTYPE, Value::object(proto));
        rcx.define_global("Array", ctor);
        Ok(())
    }
}

fn this_array(this: &Value) -> VmResult<GcRef<JsObject>> {
    this.as_array_object()
        .cloned()
        .ok_or_else(|| VmError::type_error("Receiver is not an array"))
}

fn iterate(this: &Value, cx: &mut NativeContext, kind: IterationKind) -> VmResult<Value> {
    this_array(this)?;
    new_index_iterator(&cx.current_realm(), this.clone(), kind)
}

fn array_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let realm = cx.current_realm();
    if args.len() == 1 {
        if let Some(n) = arg(args, 0).as_number() {
            if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                return Err(VmError::range_error("Invalid array length"));
            }
            let arr = JsObject::alloc_array(0, realm.array_prototype());
            arr.set_elements_len(n as usize);
            return Ok(Value::Array(arr));
        }
    }
    Ok(new_array(&realm, args.to_vec()))
}

fn array_of(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    Ok(new_array(&cx.current_realm(), args.to_vec()))
}

fn array_from(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let items = cx.iterable_to_array(arg(args, 0))?;
    let mapper = arg(args, 1);
    if mapper.is_undefined() {
        return Ok(new_array(&cx.current_realm(), items));
    }
    let mapper = require_callable(mapper, "Array.from mapper")?;
    let mut mapped = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        mapped.push(cx.call(&mapper, &Value::Undefined, &[item, Value::number(i as f64)])?);
    }
    Ok(new_array(&cx.current_realm(), mapped))
}

fn array_push(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    for value in args {
        arr.push_element(value.clone());
    }
    Ok(Value::number(arr.elements_len() as f64))
}

fn array_pop(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    Ok(arr.pop_element().unwrap_or(Value::Undefined))
}

fn array_index_of(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let needle = arg(args, 0);
    let items = arr.elements_snapshot();
    for (i, item) in items.iter().enumerate() {
        if convert::strict_equals(item, needle) {
            return Ok(Value::number(i as f64));
        }
    }
    Ok(Value::int32(-1))
}

fn array_includes(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let needle = arg(args, 0);
    Ok(Value::boolean(
        arr.elements_snapshot()
            .iter()
            .any(|item| convert::same_value_zero(item, needle)),
    ))
}

fn array_join(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => cx.to_string_value(other)?.as_str().to_string(),
    };
    let mut parts = Vec::with_capacity(arr.elements_len());
    for item in arr.elements_snapshot() {
        if item.is_nullish() {
            parts.push(String::new());
        } else {
            parts.push(cx.to_string_value(&item)?.as_str().to_string());
        }
    }
    Ok(Value::string(parts.join(&separator)))
}

fn array_to_string(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    array_join(this, &[], cx)
}

fn array_slice(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let len = arr.elements_len();
    let start = convert::relative_index(cx.to_number(arg(args, 0)).unwrap_or(0.0), len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    let items = arr.elements_snapshot();
    let slice = items
        .get(start..end.max(start))
        .map(<[Value]>::to_vec)
        .unwrap_or_default();
    Ok(new_array(&cx.current_realm(), slice))
}

fn array_concat(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let mut items = arr.elements_snapshot();
    for other in args {
        if let Some(other_arr) = other.as_array_object() {
            items.extend(other_arr.elements_snapshot());
        } else {
            items.push(other.clone());
        }
    }
    Ok(new_array(&cx.current_realm(), items))
}

fn with_callback<F>(
    this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
    what: &str,
    mut f: F,
) -> VmResult<()>
where
    F: FnMut(&mut NativeContext, Value, usize) -> VmResult<bool>,
{
    let arr = this_array(this)?;
    require_callable(arg(args, 0), what)?;
    let mut index = 0;
    // Live length read each pass: callbacks may append or truncate.
    while index < arr.elements_len() {
        let item = arr.element(index).unwrap_or(Value::Undefined);
        if !f(cx, item, index)? {
            break;
        }
        index += 1;
    }
    Ok(())
}

fn call_callback(
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

fn array_for_each(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    with_callback(this, args, cx, "forEach callback", |cx, item, i| {
        call_callback(cx, &callback, &this_arg, item, i, this)?;
        Ok(true)
    })?;
    Ok(Value::Undefined)
}

fn array_map(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut out = Vec::new();
    with_callback(this, args, cx, "map callback", |cx, item, i| {
        out.push(call_callback(cx, &callback, &this_arg, item, i, this)?);
        Ok(true)
    })?;
    Ok(new_array(&cx.current_realm(), out))
}

fn array_filter(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut out = Vec::new();
    with_callback(this, args, cx, "filter callback", |cx, item, i| {
        if call_callback(cx, &callback, &this_arg, item.clone(), i, this)?.to_boolean() {
            out.push(item);
        }
        Ok(true)
    })?;
    Ok(new_array(&cx.current_realm(), out))
}

fn array_find(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut found = Value::Undefined;
    with_callback(this, args, cx, "find callback", |cx, item, i| {
        if call_callback(cx, &callback, &this_arg, item.clone(), i, this)?.to_boolean() {
            found = item;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(found)
}

fn array_find_index(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut found = -1i64;
    with_callback(this, args, cx, "findIndex callback", |cx, item, i| {
        if call_callback(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            found = i as i64;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::number(found as f64))
}

fn array_every(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut all = true;
    with_callback(this, args, cx, "every callback", |cx, item, i| {
        if !call_callback(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            all = false;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::boolean(all))
}

fn array_some(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let callback = arg(args, 0).clone();
    let this_arg = arg(args, 1).clone();
    let mut any = false;
    with_callback(this, args, cx, "some callback", |cx, item, i| {
        if call_callback(cx, &callback, &this_arg, item, i, this)?.to_boolean() {
            any = true;
            return Ok(false);
        }
        Ok(true)
    })?;
    Ok(Value::boolean(any))
}

fn array_reduce(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let arr = this_array(this)?;
    let callback = require_callable(arg(args, 0), "reduce callback")?;
    let items = arr.elements_snapshot();
    let mut iter = items.into_iter().enumerate();

    let mut acc = if args.len() > 1 {
        arg(args, 1).clone()
    } else {
        match iter.next() {
            Some((_, first)) => first,
            None => {
                return Err(VmError::type_error("Reduce of empty array with no initial value"));
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
