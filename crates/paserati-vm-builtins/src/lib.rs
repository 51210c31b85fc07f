//! Built-in objects for the Paserati runtime, installed through a
//! priority-ordered two-phase pipeline.
//!
//! Every builtin implements [`Builtin`]: `init_types` registers its
//! declarations with the static checker, `init_runtime` installs the live
//! constructor/prototype graph into a realm. The pipeline runs every
//! `init_types` in ascending priority, then every `init_runtime` in the
//! same order, so an initializer can always read its dependencies'
//! prototypes from the realm's intrinsic slots.

pub mod abort;
pub mod array;
pub mod array_buffer;
pub mod blob;
pub mod boolean;
pub mod console;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod function;
pub mod helpers;
pub mod iterator;
pub mod json;
pub mod map;
pub mod math;
pub mod object;
pub mod string;
pub mod symbol;
pub mod typed_array;
pub mod types;
pub mod weak_map;

use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::realm::Realm;
use paserati_vm_core::{GcRef, NativeContext, Value, VmResult};

use crate::types::TypeContext;

/// Initializer priorities. Lower numbers install earlier; a builtin that
/// reads another's prototype must be strictly later.
pub mod priority {
    pub const OBJECT: u32 = 0;
    pub const FUNCTION: u32 = 1;
    pub const ITERATOR: u32 = 2;
    pub const ARRAY: u32 = 3;
    pub const SYMBOL: u32 = 5;
    pub const ERROR: u32 = 20;
    pub const ERROR_SUBCLASS: u32 = 22;
    pub const MATH: u32 = 100;
    pub const JSON: u32 = 101;
    pub const CONSOLE: u32 = 102;
    pub const ABORT: u32 = 190;
    pub const FETCH: u32 = 200;
    pub const BLOB: u32 = 210;
    pub const STRING: u32 = 300;
    pub const BOOLEAN: u32 = 340;
    pub const MAP: u32 = 400;
    pub const WEAK_MAP: u32 = 410;
    pub const ARRAY_BUFFER: u32 = 415;
    pub const TYPED_ARRAY: u32 = 416;
    /// Concrete typed arrays occupy 420..=430 in kind order.
    pub const TYPED_ARRAYS_BASE: u32 = 420;
}

/// A builtin initializer.
pub trait Builtin {
    /// Unique identifier, e.g. `"Map"`.
    fn name(&self) -> &'static str;
    /// Position in the pipeline's total order.
    fn priority(&self) -> u32;
    /// Phase one: type declarations for the static checker.
    fn init_types(&self, tcx: &mut dyn TypeContext);
    /// Phase two: install runtime values in the current realm.
    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()>;
}

/// Realm-scoped installation context handed to `init_runtime`.
pub struct RuntimeContext<'a> {
    cx: &'a mut NativeContext,
}

impl<'a> RuntimeContext<'a> {
    pub fn new(cx: &'a mut NativeContext) -> Self {
        Self { cx }
    }

    pub fn realm(&self) -> Realm {
        self.cx.current_realm()
    }

    /// The native context, for initializers that need calls or coercion.
    pub fn native(&mut self) -> &mut NativeContext {
        self.cx
    }

    /// Bind a global: `{writable, non-enumerable, configurable}` like every
    /// installed constructor.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.realm()
            .global
            .set_own_non_enumerable(PropertyKey::string(name), value);
    }

    /// Read a dependency's intrinsic slot; failure here means the pipeline
    /// priorities are wrong.
    pub fn intrinsic_object(
        &self,
        key: &str,
    ) -> VmResult<GcRef<paserati_vm_core::object::JsObject>> {
        self.realm().intrinsic_object(key).ok_or_else(|| {
            paserati_vm_core::VmError::internal(format!(
                "intrinsic {key} not installed; check initializer priorities"
            ))
        })
    }

    pub fn set_intrinsic(&self, key: impl Into<String>, value: Value) {
        self.realm().set_intrinsic(key, value);
    }
}

/// The full builtin set in registration order (the pipeline sorts by
/// priority regardless).
pub fn default_builtins() -> Vec<Box<dyn Builtin>> {
    let mut builtins: Vec<Box<dyn Builtin>> = vec![
        Box::new(object::ObjectBuiltin),
        Box::new(function::FunctionBuiltin),
        Box::new(iterator::IteratorBuiltin),
        Box::new(array::ArrayBuiltin),
        Box::new(symbol::SymbolBuiltin),
        Box::new(error::ErrorBuiltin),
        Box::new(error::ErrorSubclassesBuiltin),
        Box::new(math::MathBuiltin),
        Box::new(json::JsonBuiltin),
        Box::new(console::ConsoleBuiltin),
        Box::new(abort::AbortBuiltin),
        Box::new(fetch::FetchBuiltin::default()),
        Box::new(blob::BlobBuiltin),
        Box::new(string::StringBuiltin),
        Box::new(boolean::BooleanBuiltin),
        Box::new(map::MapBuiltin),
        Box::new(weak_map::WeakMapBuiltin),
        Box::new(array_buffer::ArrayBufferBuiltin),
        Box::new(typed_array::AbstractTypedArrayBuiltin),
    ];
    builtins.extend(typed_array::concrete_builtins());
    builtins
}

/// Run the two-phase pipeline: all `init_types` ascending, then all
/// `init_runtime` ascending.
pub fn run_pipeline(
    builtins: &mut [Box<dyn Builtin>],
    tcx: &mut dyn TypeContext,
    cx: &mut NativeContext,
) -> VmResult<()> {
    builtins.sort_by_key(|b| (b.priority(), b.name()));
    for builtin in builtins.iter() {
        builtin.init_types(tcx);
    }
    for builtin in builtins.iter() {
        let mut rcx = RuntimeContext::new(cx);
        builtin.init_runtime(&mut rcx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_respect_dependency_layering() {
        let builtins = default_builtins();
        let prio = |name: &str| {
            builtins
                .iter()
                .find(|b| b.name() == name)
                .unwrap_or_else(|| panic!("missing builtin {name}"))
                .priority()
        };

        assert!(prio("Object") < prio("Function"));
        assert!(prio("Function") < prio("Iterator"));
        assert!(prio("Iterator") < prio("Array"));
        assert!(prio("Array") < prio("Symbol"));
        assert!(prio("Symbol") < prio("Error"));
        assert!(prio("Error") < prio("ErrorSubclasses"));
        assert!(prio("Error") < prio("fetch"));
        assert!(prio("Map") < prio("WeakMap"));
        assert!(prio("ArrayBuffer") < prio("TypedArray"));
        assert!(prio("TypedArray") < prio("Int8Array"));
        assert!(prio("Int8Array") < prio("BigUint64Array"));
    }

    #[test]
    fn test_builtin_names_unique() {
        let builtins = default_builtins();
        let mut names: Vec<_> = builtins.iter().map(|b| b.name()).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
