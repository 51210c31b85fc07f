//! Abstract coercion operations on primitives.
//!
//! Everything here is context-free. Object-to-primitive conversion needs to
//! re-enter the VM (`Symbol.toPrimitive`, `valueOf`, `toString`), so it lives
//! on `NativeContext`; these helpers are the primitive tail of those
//! protocols plus the equality algorithms.

use crate::error::{VmError, VmResult};
use crate::gc::GcRef;
use crate::value::Value;

/// ToInt32.
pub fn to_int32(n: f64) -> i32 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return 0;
    }
    let i = n.trunc() as i64;
    (i % (1_i64 << 32)) as i32
}

/// ToUint32.
pub fn to_uint32(n: f64) -> u32 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return 0;
    }
    let i = n.trunc() as i64;
    (i % (1_i64 << 32)) as u32
}

/// ToIntegerOrInfinity: truncate toward zero, `NaN → 0`, `-0 → 0`,
/// infinities pass through.
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        return 0.0;
    }
    if n.is_infinite() {
        return n;
    }
    let t = n.trunc();
    if t == 0.0 { 0.0 } else { t }
}

/// Clamp a relative index (`-len..len`) the way `at`/`slice` arguments do.
pub fn relative_index(raw: f64, len: usize) -> usize {
    let len = len as f64;
    let idx = to_integer_or_infinity(raw);
    let resolved = if idx < 0.0 { len + idx } else { idx };
    resolved.clamp(0.0, len) as usize
}

/// ToNumber on a primitive. Objects must go through the context's
/// `to_primitive` first. `Symbol` and `BigInt` throw TypeError, never a
/// silent substitute.
pub fn primitive_to_number(value: &Value) -> VmResult<f64> {
    match value {
        Value::Undefined | Value::Hole => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Int32(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        Value::String(s) => Ok(string_to_number(s.as_str())),
        Value::Symbol(_) => Err(VmError::type_error("Cannot convert a Symbol to a number")),
        Value::BigInt(_) => Err(VmError::type_error("Cannot convert a BigInt to a number")),
        other => Err(VmError::internal(format!(
            "primitive_to_number called on non-primitive {}",
            other.type_of()
        ))),
    }
}

/// ToString on a primitive. `Symbol` throws TypeError.
pub fn primitive_to_string(value: &Value) -> VmResult<String> {
    match value {
        Value::Undefined | Value::Hole => Ok("undefined".to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Int32(n) => {
            let mut buf = itoa::Buffer::new();
            Ok(buf.format(*n).to_string())
        }
        Value::Float(n) => Ok(number_to_string(*n)),
        Value::String(s) => Ok(s.as_str().to_string()),
        Value::BigInt(b) => Ok(b.to_string()),
        Value::Symbol(_) => Err(VmError::type_error("Cannot convert a Symbol to a string")),
        other => Err(VmError::internal(format!(
            "primitive_to_string called on non-primitive {}",
            other.type_of()
        ))),
    }
}

/// StringToNumber: trimmed decimal with the `Infinity` spellings;
/// empty string is 0, anything unparseable is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Number-to-string with ECMAScript formatting: integral values print
/// without a fraction, and exponents carry an explicit sign.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{:.0}", n);
    }
    let mut buf = ryu::Buffer::new();
    let formatted = buf.format(n);
    match formatted.find('e') {
        Some(pos) if !formatted[pos + 1..].starts_with('-') => {
            format!("{}e+{}", &formatted[..pos], &formatted[pos + 1..])
        }
        _ => formatted.to_string(),
    }
}

/// Strict equality (`===`): kinds must match (numbers compare across the
/// int32/float split), primitives by value, heap values by identity.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x.id == y.id,
        (Value::BigInt(x), Value::BigInt(y)) => x.value == y.value,
        _ if a.is_number() && b.is_number() => {
            // NaN != NaN per IEEE 754; +0 == -0.
            a.as_number().unwrap() == b.as_number().unwrap()
        }
        _ => heap_identity(a, b).unwrap_or(false),
    }
}

/// SameValueZero: strict equality except `NaN` equals `NaN`.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        let x = a.as_number().unwrap();
        let y = b.as_number().unwrap();
        return x == y || (x.is_nan() && y.is_nan());
    }
    strict_equals(a, b)
}

/// SameValue: SameValueZero but `+0` and `-0` are distinct.
pub fn same_value(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        let x = a.as_number().unwrap();
        let y = b.as_number().unwrap();
        if x.is_nan() && y.is_nan() {
            return true;
        }
        return x == y && x.is_sign_positive() == y.is_sign_positive();
    }
    strict_equals(a, b)
}

fn heap_identity(a: &Value, b: &Value) -> Option<bool> {
    fn ptr_of(v: &Value) -> Option<*const ()> {
        match v {
            Value::Object(o) | Value::Array(o) => Some(o.as_ptr() as *const ()),
            Value::Map(m) => Some(m.as_ptr() as *const ()),
            Value::Set(s) => Some(s.as_ptr() as *const ()),
            Value::WeakMap(w) => Some(w.as_ptr() as *const ()),
            Value::ArrayBuffer(b) => Some(b.as_ptr() as *const ()),
            Value::SharedArrayBuffer(b) => Some(b.as_ptr() as *const ()),
            Value::TypedArray(t) => Some(t.as_ptr() as *const ()),
            Value::RegExp(r) => Some(r.as_ptr() as *const ()),
            Value::NativeFunction(f) => Some(f.as_ptr() as *const ()),
            Value::Promise(p) => Some(p.as_ptr() as *const ()),
            _ => None,
        }
    }
    Some(ptr_of(a)? == ptr_of(b)?)
}

/// Hashable wrapper implementing SameValueZero, for map keys.
#[derive(Clone, Debug)]
pub struct MapKey(Value);

impl MapKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        same_value_zero(&self.0, &other.0)
    }
}

impl Eq for MapKey {}

impl std::hash::Hash for MapKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Undefined | Value::Hole => 0u8.hash(state),
            Value::Null => 1u8.hash(state),
            Value::Boolean(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Int32(_) | Value::Float(_) => {
                // All numbers hash through canonical f64 bits so that
                // SameValueZero-equal keys collide: NaN canonicalized,
                // -0 folded into +0, and int32 widened.
                3u8.hash(state);
                let n = self.0.as_number().unwrap();
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if n == 0.0 {
                    0u64
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::Symbol(sym) => {
                5u8.hash(state);
                sym.id.hash(state);
            }
            Value::BigInt(b) => {
                6u8.hash(state);
                b.value.hash(state);
            }
            other => {
                7u8.hash(state);
                let ptr = other
                    .as_object()
                    .map(|o| o.as_ptr() as usize)
                    .or_else(|| other.as_promise().map(|p| GcRef::as_ptr(p) as usize))
                    .unwrap_or(0);
                ptr.hash(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JsObject;

    #[test]
    fn test_to_integer_or_infinity() {
        assert_eq!(to_integer_or_infinity(3.9), 3.0);
        assert_eq!(to_integer_or_infinity(-3.9), -3.0);
        assert_eq!(to_integer_or_infinity(f64::NAN), 0.0);
        assert_eq!(to_integer_or_infinity(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(to_integer_or_infinity(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-1.5), "-1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  12.5 "), 12.5);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("12x").is_nan());
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
    }

    #[test]
    fn test_strict_equals() {
        assert!(strict_equals(&Value::int32(1), &Value::Float(1.0)));
        assert!(!strict_equals(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
        assert!(strict_equals(&Value::Float(0.0), &Value::Float(-0.0)));
        assert!(!strict_equals(&Value::int32(1), &Value::string("1")));

        let a = Value::object(JsObject::alloc(None));
        let b = Value::object(JsObject::alloc(None));
        assert!(strict_equals(&a, &a.clone()));
        assert!(!strict_equals(&a, &b));
    }

    #[test]
    fn test_same_value_zero() {
        assert!(same_value_zero(
            &Value::Float(f64::NAN),
            &Value::Float(f64::NAN)
        ));
        assert!(same_value_zero(&Value::Float(0.0), &Value::Float(-0.0)));
    }

    #[test]
    fn test_same_value_distinguishes_zero() {
        assert!(!same_value(&Value::Float(0.0), &Value::Float(-0.0)));
        assert!(same_value(&Value::Float(f64::NAN), &Value::Float(f64::NAN)));
    }

    #[test]
    fn test_symbol_to_number_throws() {
        let sym = Value::symbol(crate::symbol::JsSymbol::new(None));
        assert!(primitive_to_number(&sym).is_err());
    }

    #[test]
    fn test_map_key_hash_consistency() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let hash = |k: &MapKey| {
            let mut h = DefaultHasher::new();
            k.hash(&mut h);
            h.finish()
        };

        let int_key = MapKey::new(Value::int32(5));
        let float_key = MapKey::new(Value::Float(5.0));
        assert_eq!(int_key, float_key);
        assert_eq!(hash(&int_key), hash(&float_key));

        let zero = MapKey::new(Value::Float(0.0));
        let neg_zero = MapKey::new(Value::Float(-0.0));
        assert_eq!(zero, neg_zero);
        assert_eq!(hash(&zero), hash(&neg_zero));
    }
}
