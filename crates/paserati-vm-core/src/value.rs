//! The tagged runtime value.
//!
//! Every value hosted code can observe is one [`Value`] kind, testable in
//! O(1) via the enum discriminant. Primitives are stored inline; heap kinds
//! hold a [`GcRef`] and compare by identity. Heap kinds that expose
//! properties to hosted code (maps, typed arrays, buffers, native functions,
//! regexps) embed a `JsObject` part so prototype walks and `instanceof`
//! treat them uniformly.

use std::sync::Arc;

use crate::array_buffer::JsArrayBuffer;
use crate::bigint::JsBigInt;
use crate::error::VmResult;
use crate::gc::GcRef;
use crate::map_data::{JsMap, JsSet};
use crate::object::{JsObject, PropertyKey};
use crate::promise::JsPromise;
use crate::realm::RealmId;
use crate::regexp::JsRegExp;
use crate::shared_buffer::SharedArrayBuffer;
use crate::string::JsString;
use crate::symbol::JsSymbol;
use crate::typed_array::JsTypedArray;
use crate::weak::JsWeakMap;

/// Internal slot name carried by every error object.
pub const ERROR_DATA_SLOT: &str = "[[ErrorData]]";

/// Native function handler.
///
/// Receives `(this, args, &mut NativeContext)`. `this` is threaded by the
/// VM rather than closed over, keeping one uniform signature for every
/// native callable.
pub type NativeFn = Arc<
    dyn Fn(&Value, &[Value], &mut crate::context::NativeContext) -> VmResult<Value> + Send + Sync,
>;

/// A native function together with its property object.
///
/// The object part carries `name`, `length`, `prototype` for constructors,
/// and the `[[Prototype]]` link to `%Function.prototype%`.
pub struct NativeFunctionObject {
    /// The Rust handler.
    pub func: NativeFn,
    /// Property storage and prototype link.
    pub object: GcRef<JsObject>,
    /// Realm the function was created in; `new.target` prototype resolution
    /// falls back to this realm's intrinsics.
    pub realm: RealmId,
    /// Whether `new` is allowed on this function.
    pub constructable: bool,
}

impl std::fmt::Debug for NativeFunctionObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunctionObject")
            .field("realm", &self.realm)
            .field("constructable", &self.constructable)
            .finish_non_exhaustive()
    }
}

/// A JavaScript value.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    /// 32-bit integer fast path; observationally a number.
    Int32(i32),
    /// IEEE-754 double; integral in-range values normalize to `Int32`.
    Float(f64),
    String(JsString),
    BigInt(GcRef<JsBigInt>),
    Symbol(GcRef<JsSymbol>),
    /// Plain or dictionary object; the distinction lives inside `JsObject`.
    Object(GcRef<JsObject>),
    /// Dense array; element storage lives in the object part.
    Array(GcRef<JsObject>),
    Map(GcRef<JsMap>),
    Set(GcRef<JsSet>),
    WeakMap(GcRef<JsWeakMap>),
    ArrayBuffer(GcRef<JsArrayBuffer>),
    SharedArrayBuffer(GcRef<SharedArrayBuffer>),
    TypedArray(GcRef<JsTypedArray>),
    RegExp(GcRef<JsRegExp>),
    NativeFunction(GcRef<NativeFunctionObject>),
    Promise(GcRef<JsPromise>),
    /// Absent element in a sparse array. Never user-visible: reads convert
    /// it to `undefined`.
    Hole,
}

impl Value {
    #[inline]
    pub const fn undefined() -> Self {
        Value::Undefined
    }

    #[inline]
    pub const fn null() -> Self {
        Value::Null
    }

    #[inline]
    pub const fn boolean(b: bool) -> Self {
        Value::Boolean(b)
    }

    #[inline]
    pub const fn int32(n: i32) -> Self {
        Value::Int32(n)
    }

    /// Create a number, normalizing integral in-range values to `Int32`
    /// while preserving `-0.0` as a float.
    #[inline]
    pub fn number(n: f64) -> Self {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && (n != 0.0 || (1.0_f64 / n).is_sign_positive())
        {
            Value::Int32(n as i32)
        } else {
            Value::Float(n)
        }
    }

    #[inline]
    pub fn string(s: impl Into<JsString>) -> Self {
        Value::String(s.into())
    }

    pub fn symbol(sym: GcRef<JsSymbol>) -> Self {
        Value::Symbol(sym)
    }

    pub fn bigint(b: GcRef<JsBigInt>) -> Self {
        Value::BigInt(b)
    }

    pub fn object(obj: GcRef<JsObject>) -> Self {
        Value::Object(obj)
    }

    pub fn array(obj: GcRef<JsObject>) -> Self {
        Value::Array(obj)
    }

    pub fn promise(p: GcRef<JsPromise>) -> Self {
        Value::Promise(p)
    }

    // ------------------------------------------------------------------
    // Kind predicates
    // ------------------------------------------------------------------

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    #[inline]
    pub fn is_hole(&self) -> bool {
        matches!(self, Value::Hole)
    }

    #[inline]
    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Float(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    #[inline]
    pub fn is_bigint(&self) -> bool {
        matches!(self, Value::BigInt(_))
    }

    /// True for every object-like kind, including functions, arrays,
    /// collections, buffers, and promises.
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            Value::Object(_)
                | Value::Array(_)
                | Value::Map(_)
                | Value::Set(_)
                | Value::WeakMap(_)
                | Value::ArrayBuffer(_)
                | Value::SharedArrayBuffer(_)
                | Value::TypedArray(_)
                | Value::RegExp(_)
                | Value::NativeFunction(_)
                | Value::Promise(_)
        )
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::NativeFunction(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    pub fn is_typed_array(&self) -> bool {
        matches!(self, Value::TypedArray(_))
    }

    #[inline]
    pub fn is_promise(&self) -> bool {
        matches!(self, Value::Promise(_))
    }

    /// True iff the value is an object carrying the `[[ErrorData]]` internal
    /// slot. This is a slot check, never a prototype-chain walk.
    pub fn is_error_data(&self) -> bool {
        self.as_object()
            .is_some_and(|obj| obj.has_internal_slot(ERROR_DATA_SLOT))
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int32(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&JsString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&GcRef<JsSymbol>> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&GcRef<JsBigInt>> {
        match self {
            Value::BigInt(b) => Some(b),
            _ => None,
        }
    }

    /// The property-carrying object part of any object-like value.
    pub fn as_object(&self) -> Option<GcRef<JsObject>> {
        match self {
            Value::Object(o) | Value::Array(o) => Some(o.clone()),
            Value::Map(m) => Some(m.object.clone()),
            Value::Set(s) => Some(s.object.clone()),
            Value::WeakMap(w) => Some(w.object.clone()),
            Value::ArrayBuffer(b) => Some(b.object.clone()),
            Value::SharedArrayBuffer(b) => Some(b.object.clone()),
            Value::TypedArray(t) => Some(t.object.clone()),
            Value::RegExp(r) => Some(r.object.clone()),
            Value::NativeFunction(f) => Some(f.object.clone()),
            _ => None,
        }
    }

    pub fn as_array_object(&self) -> Option<&GcRef<JsObject>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&GcRef<JsMap>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&GcRef<JsSet>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_weak_map(&self) -> Option<&GcRef<JsWeakMap>> {
        match self {
            Value::WeakMap(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_array_buffer(&self) -> Option<&GcRef<JsArrayBuffer>> {
        match self {
            Value::ArrayBuffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_shared_array_buffer(&self) -> Option<&GcRef<SharedArrayBuffer>> {
        match self {
            Value::SharedArrayBuffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_typed_array(&self) -> Option<&GcRef<JsTypedArray>> {
        match self {
            Value::TypedArray(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_regexp(&self) -> Option<&GcRef<JsRegExp>> {
        match self {
            Value::RegExp(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_native_function(&self) -> Option<&GcRef<NativeFunctionObject>> {
        match self {
            Value::NativeFunction(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_promise(&self) -> Option<&GcRef<JsPromise>> {
        match self {
            Value::Promise(p) => Some(p),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Cheap conversions
    // ------------------------------------------------------------------

    /// ToBoolean: truthiness.
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Hole => false,
            Value::Boolean(b) => *b,
            Value::Int32(n) => *n != 0,
            Value::Float(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::BigInt(b) => !b.is_zero(),
            _ => true,
        }
    }

    /// The `typeof` operator result.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined | Value::Hole => "undefined",
            // typeof null === "object" (historical)
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Int32(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::BigInt(_) => "bigint",
            Value::Symbol(_) => "symbol",
            Value::NativeFunction(_) => "function",
            _ => "object",
        }
    }

    /// Read the function name installed on a callable's object part.
    pub fn function_name(&self) -> Option<String> {
        let func = self.as_native_function()?;
        match func.object.get_own(&PropertyKey::string("name")) {
            Some(desc) => desc
                .data_value()
                .and_then(|v| v.as_string().map(|s| s.as_str().to_string())),
            None => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

/// Strict-equality-flavored comparison: primitives by value (`NaN != NaN`),
/// objects by identity. Full semantics live in `convert::strict_equals`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::convert::strict_equals(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_normalization() {
        assert!(matches!(Value::number(42.0), Value::Int32(42)));
        assert!(matches!(Value::number(3.5), Value::Float(_)));
        // -0.0 must stay a float so SameValue can distinguish it
        assert!(matches!(Value::number(-0.0), Value::Float(_)));
        assert!(matches!(Value::number(0.0), Value::Int32(0)));
        assert!(matches!(Value::number(1e100), Value::Float(_)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::undefined().to_boolean());
        assert!(!Value::null().to_boolean());
        assert!(!Value::int32(0).to_boolean());
        assert!(!Value::Float(f64::NAN).to_boolean());
        assert!(!Value::string("").to_boolean());
        assert!(Value::string("x").to_boolean());
        assert!(Value::int32(-1).to_boolean());
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::undefined().type_of(), "undefined");
        assert_eq!(Value::null().type_of(), "object");
        assert_eq!(Value::boolean(true).type_of(), "boolean");
        assert_eq!(Value::number(1.5).type_of(), "number");
        assert_eq!(Value::string("a").type_of(), "string");
    }

    #[test]
    fn test_hole_is_not_user_visible_kind() {
        let hole = Value::Hole;
        assert!(hole.is_hole());
        assert!(!hole.to_boolean());
        assert_eq!(hole.type_of(), "undefined");
    }

    #[test]
    fn test_value_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Value>();
    }
}
