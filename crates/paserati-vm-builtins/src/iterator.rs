//! `%IteratorPrototype%` and the index-based iterator shared by arrays and
//! typed arrays.
//!
//! Iterator objects are plain objects with internal cursor slots; `next` is
//! a prototype method that reads and advances the cursor, so iterators stay
//! live against their target.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{JsObject, PropertyKey};
use paserati_vm_core::realm::{Realm, intrinsic_keys};
use paserati_vm_core::symbol::well_known_symbols;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::{new_array, new_plain_object};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const ITER_TARGET: &str = "[[IteratedObject]]";
const ITER_INDEX: &str = "[[ArrayIteratorNextIndex]]";
const ITER_KIND: &str = "[[ArrayIterationKind]]";

/// What an index iterator yields.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum IterationKind {
    Keys,
    Values,
    Entries,
}

impl IterationKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Entries => "entries",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "keys" => Self::Keys,
            "entries" => Self::Entries,
            _ => Self::Values,
        }
    }
}

pub struct IteratorBuiltin;

impl Builtin for IteratorBuiltin {
    fn name(&self) -> &'static str {
        "Iterator"
    }

    fn priority(&self) -> u32 {
        priority::ITERATOR
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_type_alias(
            "IteratorResult",
            Type::Object(vec![
                ("value".into(), Type::Any),
                ("done".into(), Type::Boolean),
            ]),
        );
        tcx.define_type_alias(
            "Iterator",
            Type::Object(vec![(
                "next".into(),
                Type::function(vec![], Type::named("IteratorResult")),
            )]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();

        // %IteratorPrototype%: just [Symbol.iterator]() { return this }
        let iterator_prototype = JsObject::alloc(Some(realm.object_prototype()));
        let self_fn = paserati_vm_core::builtin_builder::native_callable(
            &realm,
            "[Symbol.iterator]",
            0,
            |this, _args, _cx| Ok(this.clone()),
        );
        iterator_prototype.set_own_non_enumerable(
            PropertyKey::symbol(well_known_symbols().iterator.clone()),
            self_fn,
        );
        rcx.set_intrinsic(
            intrinsic_keys::ITERATOR_PROTOTYPE,
            Value::object(iterator_prototype.clone()),
        );

        // %ArrayIteratorPrototype%
        let (_, array_iter_proto) =
            BuiltInBuilder::new(&realm, "Array Iterator")
                .inherits(iterator_prototype)
                .method("next", array_iterator_next, 0)
                .property(
                    PropertyKey::symbol(well_known_symbols().to_string_tag.clone()),
                    Value::string("Array Iterator"),
                    paserati_vm_core::object::PropertyAttributes::builtin_accessor(),
                )
                .build();
        rcx.set_intrinsic(
            intrinsic_keys::ARRAY_ITERATOR_PROTOTYPE,
            Value::object(array_iter_proto),
        );
        Ok(())
    }
}

/// Allocate a live index iterator over an array or typed array.
pub fn new_index_iterator(realm: &Realm, target: Value, kind: IterationKind) -> VmResult<Value> {
    let proto = realm
        .intrinsic_object(intrinsic_keys::ARRAY_ITERATOR_PROTOTYPE)
        .ok_or_else(|| VmError::internal("%ArrayIteratorPrototype% not installed"))?;
    let iter = JsObject::alloc(Some(proto));
    iter.set_internal_slot(ITER_TARGET, target);
    iter.set_internal_slot(ITER_INDEX, Value::int32(0));
    iter.set_internal_slot(ITER_KIND, Value::string(kind.as_str()));
    Ok(Value::object(iter))
}

/// `{ value, done }` step object.
pub fn new_step_result(realm: &Realm, value: Value, done: bool) -> Value {
    let obj = new_plain_object(realm);
    obj.set_own(PropertyKey::string("value"), value);
    obj.set_own(PropertyKey::string("done"), Value::boolean(done));
    Value::object(obj)
}

fn array_iterator_next(this: &Value, _args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let realm = cx.current_realm();
    let iter = this
        .as_object()
        .filter(|o| o.has_internal_slot(ITER_TARGET))
        .ok_or_else(|| VmError::type_error("next called on a non-iterator receiver"))?;

    let target = iter.internal_slot(ITER_TARGET).unwrap_or(Value::Undefined);
    let index = iter
        .internal_slot(ITER_INDEX)
        .and_then(|v| v.as_int32())
        .unwrap_or(0) as usize;
    let kind = IterationKind::from_str(
        iter.internal_slot(ITER_KIND)
            .and_then(|v| v.as_string().map(|s| s.as_str().to_string()))
            .as_deref()
            .unwrap_or("values"),
    );

    let (len, element): (usize, Option<Value>) = match &target {
        Value::Array(arr) => (
            arr.elements_len(),
            arr.element(index).or(Some(Value::Undefined)),
        ),
        Value::TypedArray(ta) => (ta.length(), ta.get(index)),
        _ => {
            return Err(VmError::type_error(
                "Array iterator target is not an array",
            ));
        }
    };

    if index >= len {
        return Ok(new_step_result(&realm, Value::Undefined, true));
    }
    iter.set_internal_slot(ITER_INDEX, Value::int32(index as i32 + 1));

    let value = match kind {
        IterationKind::Keys => Value::number(index as f64),
        IterationKind::Values => element.unwrap_or(Value::Undefined),
        IterationKind::Entries => new_array(
            &realm,
            vec![
                Value::number(index as f64),
                element.unwrap_or(Value::Undefined),
            ],
        ),
    };
    Ok(new_step_result(&realm, value, false))
}
