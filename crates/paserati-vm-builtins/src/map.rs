//! The `Map` builtin: insertion-ordered entries with live iterators.
//!
//! Iterators hold a cursor into the entry array and skip tombstones, so an
//! entry deleted before the cursor reaches it is never yielded, while
//! entries appended after iterator creation are.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert::MapKey;
use paserati_vm_core::map_data::JsMap;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array, require_callable};
use crate::iterator::new_step_result;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const ITER_TARGET: &str = "[[MapIteratorTarget]]";
const ITER_POSITION: &str = "[[MapIteratorPosition]]";
const ITER_KIND: &str = "[[MapIterationKind]]";

pub struct MapBuiltin;

impl Builtin for MapBuiltin {
    fn name(&self) -> &'static str {
        "Map"
    }

    fn priority(&self) -> u32 {
        priority::MAP
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let instance = Type::Object(vec![
            ("size".into(), Type::Number),
            ("get".into(), Type::function(vec![Type::Any], Type::Any)),
            (
                "set".into(),
                Type::function(vec![Type::Any, Type::Any], Type::named("Map")),
            ),
            ("has".into(), Type::function(vec![Type::Any], Type::Boolean)),
            (
                "delete".into(),
                Type::function(vec![Type::Any], Type::Boolean),
            ),
        ]);
        tcx.define_type_alias("Map", instance.clone());
        tcx.define_global("Map", Type::ctor(vec![Type::Any], instance));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let iterator_sym = well_known_symbols().iterator.clone();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "Map")
            .constructor_fn(map_constructor, 0)
            .method("get", map_get, 1)
            .method("set", map_set, 2)
            .method("has", map_has, 1)
            .method("delete", map_delete, 1)
            .method("clear", map_clear, 0)
            .method("forEach", map_for_each, 1)
            .method("entries", |this, _a, cx| new_map_iterator(this, cx, "entries"), 0)
            .method("keys", |this, _a, cx| new_map_iterator(this, cx, "keys"), 0)
            .method("values", |this, _a, cx| new_map_iterator(this, cx, "values"), 0)
            .accessor("size", map_size)
            .symbol_method(iterator_sym, "Symbol.iterator", |this, _a, cx| {
                new_map_iterator(this, cx, "entries")
            }, 0)
            .build_with_statics();

        // %MapIteratorPrototype%
        let iterator_prototype = rcx.intrinsic_object(intrinsic_keys::ITERATOR_PROTOTYPE)?;
        let (_, iter_proto) = BuiltInBuilder::new(&realm, "Map Iterator")
            .inherits(iterator_prototype)
            .method("next", map_iterator_next, 0)
            .property(
                PropertyKey::symbol(well_known_symbols().to_string_tag.clone()),
                Value::string("Map Iterator"),
                paserati_vm_core::object::PropertyAttributes::builtin_accessor(),
            )
            .build();
        rcx.set_intrinsic(
            intrinsic_keys::MAP_ITERATOR_PROTOTYPE,
            Value::object(iter_proto),
        );

        rcx.set_intrinsic(intrinsic_keys::MAP_PROTOTYPE, Value::object(proto));
        rcx.define_global("Map", ctor);
        Ok(())
    }
}

fn this_map(this: &Value, what: &str) -> VmResult<GcRef<JsMap>> {
    this.as_map()
        .cloned()
        .ok_or_else(|| VmError::type_error(format!("{what} requires a Map receiver")))
}

fn map_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let target = if cx.is_constructor_call() {
        cx.new_target().clone()
    } else {
        return Err(VmError::type_error("Constructor Map requires 'new'"));
    };
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::MAP_PROTOTYPE)?;
    let map = JsMap::new(proto);

    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        for entry in cx.iterable_to_array(iterable)? {
            let pair = cx.iterable_to_array(&entry)?;
            let key = pair.first().cloned().unwrap_or(Value::Undefined);
            let value = pair.get(1).cloned().unwrap_or(Value::Undefined);
            map.data.set(MapKey::new(key), value);
        }
    }
    Ok(Value::Map(map))
}

fn map_get(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.get")?;
    Ok(map
        .data
        .get(&MapKey::new(arg(args, 0).clone()))
        .unwrap_or(Value::Undefined))
}

fn map_set(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.set")?;
    map.data
        .set(MapKey::new(arg(args, 0).clone()), arg(args, 1).clone());
    Ok(this.clone())
}

fn map_has(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.has")?;
    Ok(Value::boolean(map.data.has(&MapKey::new(arg(args, 0).clone()))))
}

fn map_delete(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.delete")?;
    Ok(Value::boolean(
        map.data.delete(&MapKey::new(arg(args, 0).clone())),
    ))
}

fn map_clear(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.clear")?;
    map.data.clear();
    Ok(Value::Undefined)
}

fn map_size(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.size")?;
    Ok(Value::number(map.data.size() as f64))
}

/// `forEach` walks the entry array with the live-iteration policy and
/// propagates callback errors.
fn map_for_each(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_map(this, "Map.prototype.forEach")?;
    let callback = require_callable(arg(args, 0), "Map.prototype.forEach callback")?;
    let this_arg = arg(args, 1).clone();

    let mut position = 0;
    while position < map.data.entries_len() {
        if let Some((key, value)) = map.data.entry_at(position) {
            cx.call(&callback, &this_arg, &[value, key, this.clone()])?;
        }
        position += 1;
    }
    Ok(Value::Undefined)
}

fn new_map_iterator(this: &Value, cx: &mut NativeContext, kind: &str) -> VmResult<Value> {
    this_map(this, "Map iterator")?;
    let realm = cx.current_realm();
    let proto = realm
        .intrinsic_object(intrinsic_keys::MAP_ITERATOR_PROTOTYPE)
        .ok_or_else(|| VmError::internal("%MapIteratorPrototype% not installed"))?;
    let iter = JsObject::alloc(Some(proto));
    iter.set_internal_slot(ITER_TARGET, this.clone());
    iter.set_internal_slot(ITER_POSITION, Value::int32(0));
    iter.set_internal_slot(ITER_KIND, Value::string(kind));
    Ok(Value::object(iter))
}

fn map_iterator_next(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let realm: Realm = cx.current_realm();
    let iter = this
        .as_object()
        .filter(|o| o.has_internal_slot(ITER_TARGET))
        .ok_or_else(|| VmError::type_error("next called on a non-Map-iterator receiver"))?;

    let target = iter.internal_slot(ITER_TARGET).unwrap_or(Value::Undefined);
    let map = target
        .as_map()
        .ok_or_else(|| VmError::type_error("Map iterator target is not a Map"))?;
    let kind = iter
        .internal_slot(ITER_KIND)
        .and_then(|v| v.as_string().map(|s| s.as_str().to_string()))
        .unwrap_or_else(|| "entries".to_string());
    let mut position = iter
        .internal_slot(ITER_POSITION)
        .and_then(|v| v.as_int32())
        .unwrap_or(0) as usize;

    // Advance over tombstones; the entry array only grows, so the cursor
    // stays valid across concurrent mutation.
    while position < map.data.entries_len() {
        let entry = map.data.entry_at(position);
        position += 1;
        if let Some((key, value)) = entry {
            iter.set_internal_slot(ITER_POSITION, Value::int32(position as i32));
            let result = match kind.as_str() {
                "keys" => key,
                "values" => value,
                _ => new_array(&realm, vec![key, value]),
            };
            return Ok(new_step_result(&realm, result, false));
        }
    }
    iter.set_internal_slot(ITER_POSITION, Value::int32(position as i32));
    Ok(new_step_result(&realm, Value::Undefined, true))
}
