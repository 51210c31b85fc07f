//! The `Math` namespace.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use paserati_vm_core::builtin_builder::NamespaceBuilder;
use paserati_vm_core::object::{PropertyAttributes, PropertyKey};
use paserati_vm_core::{NativeContext, Value, VmResult};

use crate::helpers::arg;
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct MathBuiltin;

impl Builtin for MathBuiltin {
    fn name(&self) -> &'static str {
        "Math"
    }

    fn priority(&self) -> u32 {
        priority::MATH
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global(
            "Math",
            Type::Object(vec![
                ("PI".into(), Type::Number),
                ("E".into(), Type::Number),
                (
                    "abs".into(),
                    Type::function(vec![Type::Number], Type::Number),
                ),
                (
                    "random".into(),
                    Type::function(vec![], Type::Number),
                ),
            ]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let frozen = PropertyAttributes::frozen();

        let ns = NamespaceBuilder::new(&realm)
            .property(PropertyKey::string("PI"), Value::Float(std::f64::consts::PI), frozen)
            .property(PropertyKey::string("E"), Value::Float(std::f64::consts::E), frozen)
            .property(PropertyKey::string("LN2"), Value::Float(std::f64::consts::LN_2), frozen)
            .property(PropertyKey::string("LN10"), Value::Float(std::f64::consts::LN_10), frozen)
            .property(PropertyKey::string("LOG2E"), Value::Float(std::f64::consts::LOG2_E), frozen)
            .property(PropertyKey::string("LOG10E"), Value::Float(std::f64::consts::LOG10_E), frozen)
            .property(PropertyKey::string("SQRT2"), Value::Float(std::f64::consts::SQRT_2), frozen)
            .property(
                PropertyKey::string("SQRT1_2"),
                Value::Float(std::f64::consts::FRAC_1_SQRT_2),
                frozen,
            )
            .method("abs", unary(f64::abs), 1)
            .method("floor", unary(f64::floor), 1)
            .method("ceil", unary(f64::ceil), 1)
            .method("round", unary(js_round), 1)
            .method("trunc", unary(f64::trunc), 1)
            .method("sign", unary(js_sign), 1)
            .method("sqrt", unary(f64::sqrt), 1)
            .method("cbrt", unary(f64::cbrt), 1)
            .method("exp", unary(f64::exp), 1)
            .method("log", unary(f64::ln), 1)
            .method("log2", unary(f64::log2), 1)
            .method("log10", unary(f64::log10), 1)
            .method("sin", unary(f64::sin), 1)
            .method("cos", unary(f64::cos), 1)
            .method("tan", unary(f64::tan), 1)
            .method("atan", unary(f64::atan), 1)
            .method("atan2", math_atan2, 2)
            .method("pow", math_pow, 2)
            .method("min", math_min, 2)
            .method("max", math_max, 2)
            .method("hypot", math_hypot, 2)
            .method("random", math_random, 0)
            .build();

        rcx.define_global("Math", ns);
        Ok(())
    }
}

fn unary(
    f: impl Fn(f64) -> f64 + Send + Sync + Copy + 'static,
) -> impl Fn(&Value, &[Value], &mut NativeContext) -> VmResult<Value> + Send + Sync + 'static {
    move |_this, args, cx| {
        let n = cx.to_number(arg(args, 0))?;
        Ok(Value::number(f(n)))
    }
}

/// Math.round: half-up, including negative halves (-0.5 → -0).
fn js_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    (n + 0.5).floor()
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else if n > 0.0 {
        1.0
    } else {
        -1.0
    }
}

fn math_atan2(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let y = cx.to_number(arg(args, 0))?;
    let x = cx.to_number(arg(args, 1))?;
    Ok(Value::number(y.atan2(x)))
}

fn math_pow(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let base = cx.to_number(arg(args, 0))?;
    let exp = cx.to_number(arg(args, 1))?;
    Ok(Value::number(base.powf(exp)))
}

fn math_min(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let mut best = f64::INFINITY;
    for v in args {
        let n = cx.to_number(v)?;
        if n.is_nan() {
            return Ok(Value::Float(f64::NAN));
        }
        if n < best {
            best = n;
        }
    }
    Ok(Value::number(best))
}

fn math_max(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let mut best = f64::NEG_INFINITY;
    for v in args {
        let n = cx.to_number(v)?;
        if n.is_nan() {
            return Ok(Value::Float(f64::NAN));
        }
        if n > best {
            best = n;
        }
    }
    Ok(Value::number(best))
}

fn math_hypot(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let mut sum = 0.0;
    for v in args {
        let n = cx.to_number(v)?;
        sum += n * n;
    }
    Ok(Value::number(sum.sqrt()))
}

/// xorshift64* seeded once from the clock. Not cryptographic, like the
/// language's Math.random.
fn math_random(_this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    static STATE: AtomicU64 = AtomicU64::new(0);
    let mut state = STATE.load(Ordering::Relaxed);
    if state == 0 {
        state = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15)
            | 1;
    }
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    STATE.store(state, Ordering::Relaxed);
    let mantissa = state >> 11; // 53 bits
    Ok(Value::Float(mantissa as f64 / (1u64 << 53) as f64))
}
