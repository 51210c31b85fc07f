//! The `Symbol` builtin: constructor, registry statics, and the well-known
//! symbol table.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::object::{PropertyAttributes, PropertyKey};
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::string::JsString;
use paserati_vm_core::symbol::{JsSymbol, well_known_symbols};
use paserati_vm_core::symbol_registry::global_symbol_registry;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct SymbolBuiltin;

impl Builtin for SymbolBuiltin {
    fn name(&self) -> &'static str {
        "Symbol"
    }

    fn priority(&self) -> u32 {
        priority::SYMBOL
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global(
            "Symbol",
            Type::function(
                vec![Type::union(vec![Type::String, Type::Undefined])],
                Type::Symbol,
            ),
        );
        tcx.set_primitive_prototype(
            "symbol",
            Type::Object(vec![(
                "description".into(),
                Type::union(vec![Type::String, Type::Undefined]),
            )]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let wk = well_known_symbols();

        let mut builder = BuiltInBuilder::new(&realm, "Symbol")
            .constructor_fn(symbol_constructor, 0)
            .method("toString", symbol_to_string, 0)
            .method("valueOf", symbol_value_of, 0)
            .accessor("description", symbol_description)
            .static_method("for", symbol_for, 1)
            .static_method("keyFor", symbol_key_for, 1);

        // Well-known symbols as frozen statics.
        let statics: [(&str, &paserati_vm_core::GcRef<JsSymbol>); 12] = [
            ("iterator", &wk.iterator),
            ("asyncIterator", &wk.async_iterator),
            ("toStringTag", &wk.to_string_tag),
            ("hasInstance", &wk.has_instance),
            ("toPrimitive", &wk.to_primitive),
            ("isConcatSpreadable", &wk.is_concat_spreadable),
            ("match", &wk.r#match),
            ("replace", &wk.replace),
            ("search", &wk.search),
            ("split", &wk.split),
            ("species", &wk.species),
            ("unscopables", &wk.unscopables),
        ];
        for (name, sym) in statics {
            builder = builder.static_property(
                PropertyKey::string(name),
                Value::symbol((*sym).clone()),
                PropertyAttributes::frozen(),
            );
        }

        let (ctor, proto) = builder.build_with_statics();
        rcx.set_intrinsic(intrinsic_keys::SYMBOL_PROTOTYPE, Value::object(proto));
        rcx.define_global("Symbol", ctor);
        Ok(())
    }
}

fn symbol_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    if cx.is_constructor_call() {
        return Err(VmError::type_error("Symbol is not a constructor"));
    }
    let description = match arg(args, 0) {
        Value::Undefined => None,
        other => Some(JsString::from(cx.to_string_value(other)?.as_str())),
    };
    Ok(Value::symbol(JsSymbol::new(description)))
}

fn this_symbol(this: &Value, what: &str) -> VmResult<paserati_vm_core::GcRef<JsSymbol>> {
    this.as_symbol()
        .cloned()
        .ok_or_else(|| VmError::type_error(format!("{what} requires a symbol receiver")))
}

fn symbol_to_string(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let sym = this_symbol(this, "Symbol.prototype.toString")?;
    Ok(Value::string(sym.to_string()))
}

fn symbol_value_of(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    this_symbol(this, "Symbol.prototype.valueOf")?;
    Ok(this.clone())
}

fn symbol_description(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let sym = this_symbol(this, "Symbol.prototype.description")?;
    Ok(match &sym.description {
        Some(d) => Value::String(d.clone()),
        None => Value::Undefined,
    })
}

fn symbol_for(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let key = cx.to_string_value(arg(args, 0))?;
    Ok(Value::symbol(
        global_symbol_registry().get_or_insert(key.as_str()),
    ))
}

fn symbol_key_for(_this: &Value, args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let Some(sym) = arg(args, 0).as_symbol() else {
        return Err(VmError::type_error("Symbol.keyFor expects a symbol"));
    };
    Ok(match global_symbol_registry().key_for(sym) {
        Some(key) => Value::string(key),
        None => Value::Undefined,
    })
}
