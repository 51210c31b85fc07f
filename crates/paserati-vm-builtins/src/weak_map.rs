//! The `WeakMap` builtin.
//!
//! Keys must be weakly holdable (objects or unregistered symbols). There is
//! deliberately no `size`, no iteration, and no `forEach`: entry lifetime is
//! tied to key reachability and must not be observable.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::weak::{JsWeakMap, WeakKey};
use paserati_vm_core::{GcRef, NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct WeakMapBuiltin;

impl Builtin for WeakMapBuiltin {
    fn name(&self) -> &'static str {
        "WeakMap"
    }

    fn priority(&self) -> u32 {
        priority::WEAK_MAP
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let instance = Type::Object(vec![
            ("get".into(), Type::function(vec![Type::Any], Type::Any)),
            (
                "set".into(),
                Type::function(vec![Type::Any, Type::Any], Type::named("WeakMap")),
            ),
            ("has".into(), Type::function(vec![Type::Any], Type::Boolean)),
            (
                "delete".into(),
                Type::function(vec![Type::Any], Type::Boolean),
            ),
        ]);
        tcx.define_type_alias("WeakMap", instance.clone());
        tcx.define_global("WeakMap", Type::ctor(vec![Type::Any], instance));
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let (ctor, proto) = BuiltInBuilder::new(&realm, "WeakMap")
            .constructor_fn(weak_map_constructor, 0)
            .method("get", weak_map_get, 1)
            .method("set", weak_map_set, 2)
            .method("has", weak_map_has, 1)
            .method("delete", weak_map_delete, 1)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::WEAK_MAP_PROTOTYPE, Value::object(proto));
        rcx.define_global("WeakMap", ctor);
        Ok(())
    }
}

fn this_weak_map(this: &Value, what: &str) -> VmResult<GcRef<JsWeakMap>> {
    this.as_weak_map()
        .cloned()
        .ok_or_else(|| VmError::type_error(format!("{what} requires a WeakMap receiver")))
}

fn weak_map_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if !cx.is_constructor_call() {
        return Err(VmError::type_error("Constructor WeakMap requires 'new'"));
    }
    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::WEAK_MAP_PROTOTYPE)?;
    let map = JsWeakMap::new(proto);

    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        for entry in cx.iterable_to_array(iterable)? {
            let pair = cx.iterable_to_array(&entry)?;
            let key = pair.first().cloned().unwrap_or(Value::Undefined);
            let value = pair.get(1).cloned().unwrap_or(Value::Undefined);
            let weak = WeakKey::try_from_value(&key)?;
            map.data.set(weak, &key, value);
        }
    }
    Ok(Value::WeakMap(map))
}

fn weak_map_get(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_weak_map(this, "WeakMap.prototype.get")?;
    Ok(map.data.get(arg(args, 0)).unwrap_or(Value::Undefined))
}

fn weak_map_set(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_weak_map(this, "WeakMap.prototype.set")?;
    let key = arg(args, 0);
    let weak = WeakKey::try_from_value(key)?;
    map.data.set(weak, key, arg(args, 1).clone());
    Ok(this.clone())
}

fn weak_map_has(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_weak_map(this, "WeakMap.prototype.has")?;
    Ok(Value::boolean(map.data.has(arg(args, 0))))
}

fn weak_map_delete(this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let map = this_weak_map(this, "WeakMap.prototype.delete")?;
    Ok(Value::boolean(map.data.delete(arg(args, 0))))
}
