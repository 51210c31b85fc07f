//! Arbitrary-precision integers.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{VmError, VmResult};
use crate::gc::GcRef;

/// A JavaScript BigInt value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsBigInt {
    pub value: BigInt,
}

impl JsBigInt {
    pub fn new(value: BigInt) -> GcRef<JsBigInt> {
        GcRef::new(JsBigInt { value })
    }

    pub fn from_i64(n: i64) -> GcRef<JsBigInt> {
        Self::new(BigInt::from(n))
    }

    pub fn from_u64(n: u64) -> GcRef<JsBigInt> {
        Self::new(BigInt::from(n))
    }

    /// Parse decimal digits with an optional sign. Used by `BigInt64Array`
    /// construction from strings and by coercion paths.
    pub fn parse(s: &str) -> VmResult<GcRef<JsBigInt>> {
        let trimmed = s.trim();
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        digits
            .parse::<BigInt>()
            .map(Self::new)
            .map_err(|_| VmError::syntax_error(format!("Cannot convert {s} to a BigInt")))
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Wrap to a signed 64-bit value, per the BigInt64 element coercion.
    pub fn to_wrapped_i64(&self) -> i64 {
        self.to_wrapped_u64() as i64
    }

    /// Wrap to an unsigned 64-bit value, per the BigUint64 element coercion.
    pub fn to_wrapped_u64(&self) -> u64 {
        let modulus = BigInt::from(1u8) << 64u32;
        let mut r = &self.value % &modulus;
        if r.is_negative() {
            r += &modulus;
        }
        r.to_u64().unwrap_or(0)
    }
}

impl std::fmt::Display for JsBigInt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_to_i64() {
        assert_eq!(JsBigInt::from_i64(-1).to_wrapped_i64(), -1);
        assert_eq!(JsBigInt::from_i64(42).to_wrapped_i64(), 42);

        // 2^63 wraps to i64::MIN
        let big = JsBigInt::new(BigInt::from(1u8) << 63u32);
        assert_eq!(big.to_wrapped_i64(), i64::MIN);
    }

    #[test]
    fn test_wrap_to_u64() {
        assert_eq!(JsBigInt::from_i64(-1).to_wrapped_u64(), u64::MAX);
        let big = JsBigInt::new((BigInt::from(1u8) << 64u32) + 5);
        assert_eq!(big.to_wrapped_u64(), 5);
    }

    #[test]
    fn test_parse() {
        assert_eq!(JsBigInt::parse("123").unwrap().value, BigInt::from(123));
        assert!(JsBigInt::parse("12x").is_err());
    }
}
