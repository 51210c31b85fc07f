//! The `String` wrapper builtin.
//!
//! `String(v)` coerces; `new String(v)` builds a wrapper object carrying
//! the primitive in `[[PrimitiveValue]]`. Prototype methods accept either
//! the primitive or a wrapper as `this`.

use paserati_vm_core::builtin_builder::BuiltInBuilder;
use paserati_vm_core::convert;
use paserati_vm_core::object::JsObject;
use paserati_vm_core::realm::intrinsic_keys;
use paserati_vm_core::string::JsString;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

const PRIMITIVE_SLOT: &str = "[[PrimitiveValue]]";

pub struct StringBuiltin;

impl Builtin for StringBuiltin {
    fn name(&self) -> &'static str {
        "String"
    }

    fn priority(&self) -> u32 {
        priority::STRING
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global("String", Type::function(vec![Type::Any], Type::String));
        tcx.set_primitive_prototype(
            "string",
            Type::Object(vec![
                ("length".into(), Type::Number),
                (
                    "charAt".into(),
                    Type::function(vec![Type::Number], Type::String),
                ),
                (
                    "indexOf".into(),
                    Type::function(vec![Type::String], Type::Number),
                ),
                (
                    "slice".into(),
                    Type::function(vec![Type::Number, Type::Number], Type::String),
                ),
                (
                    "split".into(),
                    Type::function(vec![Type::String], Type::Array(Box::new(Type::String))),
                ),
            ]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();

        let (ctor, proto) = BuiltInBuilder::new(&realm, "String")
            .constructor_fn(string_constructor, 1)
            .method("toString", string_value_of, 0)
            .method("valueOf", string_value_of, 0)
            .method("charAt", string_char_at, 1)
            .method("charCodeAt", string_char_code_at, 1)
            .method("codePointAt", string_code_point_at, 1)
            .method("at", string_at, 1)
            .method("indexOf", string_index_of, 1)
            .method("lastIndexOf", string_last_index_of, 1)
            .method("includes", string_includes, 1)
            .method("startsWith", string_starts_with, 1)
            .method("endsWith", string_ends_with, 1)
            .method("slice", string_slice, 2)
            .method("substring", string_substring, 2)
            .method("toUpperCase", string_to_upper, 0)
            .method("toLowerCase", string_to_lower, 0)
            .method("trim", string_trim, 0)
            .method("trimStart", string_trim_start, 0)
            .method("trimEnd", string_trim_end, 0)
            .method("split", string_split, 2)
            .method("repeat", string_repeat, 1)
            .method("padStart", string_pad_start, 1)
            .method("padEnd", string_pad_end, 1)
            .method("concat", string_concat, 1)
            .method("replace", string_replace, 2)
            .method("replaceAll", string_replace_all, 2)
            .static_method("fromCharCode", string_from_char_code, 1)
            .build_with_statics();

        rcx.set_intrinsic(intrinsic_keys::STRING_PROTOTYPE, Value::object(proto));
        rcx.define_global("String", ctor);
        Ok(())
    }
}

fn string_constructor(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let primitive = match arg(args, 0) {
        Value::Undefined if args.is_empty() => JsString::intern(""),
        // String(symbol) is the one place a symbol stringifies.
        Value::Symbol(sym) if !cx.is_constructor_call() => JsString::from(sym.to_string()),
        other => cx.to_string_value(other)?,
    };
    if !cx.is_constructor_call() {
        return Ok(Value::String(primitive));
    }
    let target = cx.new_target().clone();
    let proto = cx.get_prototype_from_constructor(&target, intrinsic_keys::STRING_PROTOTYPE)?;
    let obj = JsObject::alloc(proto);
    obj.set_internal_slot(PRIMITIVE_SLOT, Value::String(primitive));
    Ok(Value::object(obj))
}

/// The receiver's string primitive: a string value, or a wrapper object.
fn this_string(this: &Value, what: &str) -> VmResult<JsString> {
    if let Some(s) = this.as_string() {
        return Ok(s.clone());
    }
    if let Some(obj) = this.as_object() {
        if let Some(Value::String(s)) = obj.internal_slot(PRIMITIVE_SLOT) {
            return Ok(s);
        }
    }
    Err(VmError::type_error(format!(
        "{what} requires a string receiver"
    )))
}

fn string_value_of(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    Ok(Value::String(this_string(this, "String.prototype.valueOf")?))
}

fn units(s: &JsString) -> Vec<u16> {
    s.as_str().encode_utf16().collect()
}

fn string_char_at(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.charAt")?;
    let idx = cx.to_integer_or_infinity(arg(args, 0))?;
    let units = units(&s);
    if idx < 0.0 || idx >= units.len() as f64 {
        return Ok(Value::string(""));
    }
    Ok(Value::string(
        String::from_utf16_lossy(&units[idx as usize..idx as usize + 1]),
    ))
}

fn string_char_code_at(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.charCodeAt")?;
    let idx = cx.to_integer_or_infinity(arg(args, 0))?;
    let units = units(&s);
    if idx < 0.0 || idx >= units.len() as f64 {
        return Ok(Value::Float(f64::NAN));
    }
    Ok(Value::number(units[idx as usize] as f64))
}

fn string_code_point_at(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.codePointAt")?;
    let idx = cx.to_integer_or_infinity(arg(args, 0))?;
    if idx < 0.0 {
        return Ok(Value::Undefined);
    }
    // Position is in UTF-16 units; decode the pair when one starts there.
    let units = units(&s);
    let i = idx as usize;
    match units.get(i) {
        None => Ok(Value::Undefined),
        Some(&u) if (0xD800..0xDC00).contains(&u) => match units.get(i + 1) {
            Some(&lo) if (0xDC00..0xE000).contains(&lo) => {
                let cp = 0x10000 + ((u as u32 - 0xD800) << 10) + (lo as u32 - 0xDC00);
                Ok(Value::number(cp as f64))
            }
            _ => Ok(Value::number(u as f64)),
        },
        Some(&u) => Ok(Value::number(u as f64)),
    }
}

fn string_at(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.at")?;
    let units = units(&s);
    let len = units.len() as f64;
    let rel = cx.to_integer_or_infinity(arg(args, 0))?;
    let idx = if rel < 0.0 { len + rel } else { rel };
    if idx < 0.0 || idx >= len {
        return Ok(Value::Undefined);
    }
    Ok(Value::string(
        String::from_utf16_lossy(&units[idx as usize..idx as usize + 1]),
    ))
}

fn string_index_of(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.indexOf")?;
    let needle = cx.to_string_value(arg(args, 0))?;
    Ok(match s.as_str().find(needle.as_str()) {
        Some(byte_pos) => Value::number(s.as_str()[..byte_pos].encode_utf16().count() as f64),
        None => Value::int32(-1),
    })
}

fn string_last_index_of(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.lastIndexOf")?;
    let needle = cx.to_string_value(arg(args, 0))?;
    Ok(match s.as_str().rfind(needle.as_str()) {
        Some(byte_pos) => Value::number(s.as_str()[..byte_pos].encode_utf16().count() as f64),
        None => Value::int32(-1),
    })
}

fn string_includes(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.includes")?;
    let needle = cx.to_string_value(arg(args, 0))?;
    Ok(Value::boolean(s.as_str().contains(needle.as_str())))
}

fn string_starts_with(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.startsWith")?;
    let needle = cx.to_string_value(arg(args, 0))?;
    Ok(Value::boolean(s.as_str().starts_with(needle.as_str())))
}

fn string_ends_with(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.endsWith")?;
    let needle = cx.to_string_value(arg(args, 0))?;
    Ok(Value::boolean(s.as_str().ends_with(needle.as_str())))
}

fn slice_units(units: &[u16], start: usize, end: usize) -> Value {
    if start >= end {
        return Value::string("");
    }
    Value::string(String::from_utf16_lossy(&units[start..end]))
}

fn string_slice(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.slice")?;
    let units = units(&s);
    let len = units.len();
    let start = convert::relative_index(cx.to_number(arg(args, 0)).unwrap_or(0.0), len);
    let end = match arg(args, 1) {
        Value::Undefined => len,
        other => convert::relative_index(cx.to_number(other)?, len),
    };
    Ok(slice_units(&units, start, end))
}

fn string_substring(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.substring")?;
    let units = units(&s);
    let len = units.len() as f64;
    let a = cx.to_integer_or_infinity(arg(args, 0))?.clamp(0.0, len) as usize;
    let b = match arg(args, 1) {
        Value::Undefined => len as usize,
        other => cx.to_integer_or_infinity(other)?.clamp(0.0, len) as usize,
    };
    Ok(slice_units(&units, a.min(b), a.max(b)))
}

fn string_to_upper(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.toUpperCase")?;
    Ok(Value::string(s.as_str().to_uppercase()))
}

fn string_to_lower(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.toLowerCase")?;
    Ok(Value::string(s.as_str().to_lowercase()))
}

fn string_trim(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.trim")?;
    Ok(Value::string(s.as_str().trim()))
}

fn string_trim_start(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.trimStart")?;
    Ok(Value::string(s.as_str().trim_start()))
}

fn string_trim_end(this: &Value, _args: &[Value], _cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.trimEnd")?;
    Ok(Value::string(s.as_str().trim_end()))
}

fn string_split(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.split")?;
    let realm = cx.current_realm();
    let separator = arg(args, 0);
    if separator.is_undefined() {
        return Ok(new_array(&realm, vec![Value::String(s)]));
    }
    let sep = cx.to_string_value(separator)?;
    let limit = match arg(args, 1) {
        Value::Undefined => usize::MAX,
        other => cx.to_number(other)? as usize,
    };
    let parts: Vec<Value> = if sep.is_empty() {
        s.as_str()
            .chars()
            .take(limit)
            .map(|c| Value::string(c.to_string()))
            .collect()
    } else {
        s.as_str()
            .split(sep.as_str())
            .take(limit)
            .map(Value::string)
            .collect()
    };
    Ok(new_array(&realm, parts))
}

fn string_repeat(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.repeat")?;
    let count = cx.to_integer_or_infinity(arg(args, 0))?;
    if count < 0.0 || count.is_infinite() {
        return Err(VmError::range_error("Invalid count value"));
    }
    Ok(Value::string(s.as_str().repeat(count as usize)))
}

fn pad(
    this: &Value,
    args: &[Value],
    cx: &mut NativeContext,
    at_start: bool,
) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.padStart")?;
    let target = cx.to_integer_or_infinity(arg(args, 0))?;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => cx.to_string_value(other)?.as_str().to_string(),
    };
    let current = s.utf16_len();
    if target <= current as f64 || filler.is_empty() {
        return Ok(Value::String(s));
    }
    let missing = target as usize - current;
    let mut padding = String::new();
    while padding.encode_utf16().count() < missing {
        padding.push_str(&filler);
    }
    let padding: String = {
        let mut out = String::new();
        let mut count = 0;
        for c in padding.chars() {
            let w = c.len_utf16();
            if count + w > missing {
                break;
            }
            count += w;
            out.push(c);
        }
        out
    };
    Ok(Value::string(if at_start {
        format!("{padding}{s}")
    } else {
        format!("{s}{padding}")
    }))
}

fn string_pad_start(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    pad(this, args, cx, true)
}

fn string_pad_end(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    pad(this, args, cx, false)
}

fn string_concat(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.concat")?;
    let mut out = s.as_str().to_string();
    for other in args {
        out.push_str(cx.to_string_value(other)?.as_str());
    }
    Ok(Value::string(out))
}

fn string_replace(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.replace")?;
    let pattern = cx.to_string_value(arg(args, 0))?;
    let replacement = cx.to_string_value(arg(args, 1))?;
    Ok(Value::string(s.as_str().replacen(
        pattern.as_str(),
        replacement.as_str(),
        1,
    )))
}

fn string_replace_all(this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let s = this_string(this, "String.prototype.replaceAll")?;
    let pattern = cx.to_string_value(arg(args, 0))?;
    let replacement = cx.to_string_value(arg(args, 1))?;
    Ok(Value::string(
        s.as_str().replace(pattern.as_str(), replacement.as_str()),
    ))
}

fn string_from_char_code(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let mut units = Vec::with_capacity(args.len());
    for v in args {
        units.push(convert::to_uint32(cx.to_number(v)?) as u16);
    }
    Ok(Value::string(String::from_utf16_lossy(&units)))
}
