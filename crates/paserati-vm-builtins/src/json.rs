//! The `JSON` namespace: parse and stringify over `serde_json`.
//!
//! `stringify` drops `undefined`, functions, and symbols the way the
//! language does, detects cycles with a TypeError, and honors function and
//! array replacers plus string/number indentation. `parse` supports a
//! reviver.

use rustc_hash::FxHashSet;
use serde_json::Value as JsonValue;

use paserati_vm_core::builtin_builder::NamespaceBuilder;
use paserati_vm_core::object::PropertyKey;
use paserati_vm_core::realm::Realm;
use paserati_vm_core::{NativeContext, Value, VmError, VmResult};

use crate::helpers::{arg, new_array, new_plain_object, string_to_key};
use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct JsonBuiltin;

impl Builtin for JsonBuiltin {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn priority(&self) -> u32 {
        priority::JSON
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        tcx.define_global(
            "JSON",
            Type::Object(vec![
                (
                    "parse".into(),
                    Type::function(vec![Type::String], Type::Any),
                ),
                (
                    "stringify".into(),
                    Type::function(
                        vec![Type::Any],
                        Type::union(vec![Type::String, Type::Undefined]),
                    ),
                ),
            ]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let ns = NamespaceBuilder::new(&realm)
            .method("parse", json_parse, 2)
            .method("stringify", json_stringify, 3)
            .build();
        rcx.define_global("JSON", ns);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

fn json_parse(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let text = cx.to_string_value(arg(args, 0))?;
    let parsed: JsonValue = serde_json::from_str(text.as_str())
        .map_err(|e| VmError::syntax_error(format!("Unexpected token in JSON: {e}")))?;
    let realm = cx.current_realm();
    let value = json_to_value(&realm, parsed);

    let reviver = arg(args, 1);
    if reviver.is_callable() {
        let reviver = reviver.clone();
        let holder = new_plain_object(&realm);
        holder.set_own(PropertyKey::string(""), value);
        return internalize(cx, &reviver, &Value::object(holder), &PropertyKey::string(""));
    }
    Ok(value)
}

pub(crate) fn json_to_value(realm: &Realm, json: JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::boolean(b),
        JsonValue::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Value::string(s),
        JsonValue::Array(items) => new_array(
            realm,
            items.into_iter().map(|i| json_to_value(realm, i)).collect(),
        ),
        JsonValue::Object(members) => {
            let obj = new_plain_object(realm);
            for (key, value) in members {
                obj.set_own(string_to_key(&key), json_to_value(realm, value));
            }
            Value::object(obj)
        }
    }
}

/// Walk the parsed tree bottom-up applying the reviver.
fn internalize(
    cx: &mut NativeContext,
    reviver: &Value,
    holder: &Value,
    key: &PropertyKey,
) -> VmResult<Value> {
    let value = cx.get(holder, key)?;
    if let Some(obj) = value.as_object() {
        for child_key in obj.enumerable_string_keys() {
            let revived = internalize(cx, reviver, &value, &child_key)?;
            if revived.is_undefined() {
                let _ = obj.delete(&child_key);
            } else {
                obj.set_own(child_key, revived);
            }
        }
    }
    cx.call(reviver, holder, &[Value::string(key.display()), value])
}

// ---------------------------------------------------------------------------
// stringify
// ---------------------------------------------------------------------------

/// Plain serialization without replacer or indentation, for native callers
/// (`Response.json`, request-body encoding). `None` when the value does not
/// serialize (`undefined`, a function, a symbol).
pub(crate) fn stringify_value(
    cx: &mut NativeContext,
    value: &Value,
) -> VmResult<Option<String>> {
    let mut stringifier = Stringifier {
        replacer: None,
        allow_list: None,
        gap: String::new(),
        seen: FxHashSet::default(),
    };
    stringifier.serialize(cx, value.clone(), "")
}

struct Stringifier {
    replacer: Option<Value>,
    allow_list: Option<Vec<String>>,
    gap: String,
    seen: FxHashSet<usize>,
}

fn json_stringify(_this: &Value, args: &[Value], cx: &mut NativeContext) -> VmResult<Value> {
    let replacer_arg = arg(args, 1);
    let (replacer, allow_list) = if replacer_arg.is_callable() {
        (Some(replacer_arg.clone()), None)
    } else if let Some(list) = replacer_arg.as_array_object() {
        let mut keys = Vec::new();
        for item in list.elements_snapshot() {
            if let Some(s) = item.as_string() {
                keys.push(s.as_str().to_string());
            } else if item.is_number() {
                keys.push(cx.to_string_value(&item)?.as_str().to_string());
            }
        }
        (None, Some(keys))
    } else {
        (None, None)
    };

    let gap = match arg(args, 2) {
        Value::Undefined => String::new(),
        space => {
            if let Some(s) = space.as_string() {
                s.as_str().chars().take(10).collect()
            } else if space.is_number() {
                let n = (cx.to_number(space)?.clamp(0.0, 10.0)) as usize;
                " ".repeat(n)
            } else {
                String::new()
            }
        }
    };

    let mut stringifier = Stringifier {
        replacer,
        allow_list,
        gap,
        seen: FxHashSet::default(),
    };
    match stringifier.serialize(cx, arg(args, 0).clone(), "")? {
        Some(text) => Ok(Value::string(text)),
        None => Ok(Value::Undefined),
    }
}

impl Stringifier {
    /// Serialize one value; `None` means "omit" (`undefined`, functions,
    /// symbols).
    fn serialize(
        &mut self,
        cx: &mut NativeContext,
        value: Value,
        indent: &str,
    ) -> VmResult<Option<String>> {
        match &value {
            Value::Undefined | Value::Hole | Value::Symbol(_) | Value::NativeFunction(_) => {
                Ok(None)
            }
            Value::Null => Ok(Some("null".to_string())),
            Value::Boolean(b) => Ok(Some(b.to_string())),
            Value::Int32(_) | Value::Float(_) => {
                let n = value.as_number().expect("number kind");
                if n.is_finite() {
                    Ok(Some(paserati_vm_core::convert::number_to_string(n)))
                } else {
                    Ok(Some("null".to_string()))
                }
            }
            Value::String(s) => Ok(Some(quote(s.as_str()))),
            Value::BigInt(_) => Err(VmError::type_error("Do not know how to serialize a BigInt")),
            Value::Array(arr) => {
                let id = arr.as_ptr() as usize;
                if !self.seen.insert(id) {
                    return Err(VmError::type_error("Converting circular structure to JSON"));
                }
                let result = self.serialize_array(cx, &value, indent);
                self.seen.remove(&id);
                result.map(Some)
            }
            _ => {
                let Some(obj) = value.as_object() else {
                    return Ok(None);
                };
                let id = obj.as_ptr() as usize;
                if !self.seen.insert(id) {
                    return Err(VmError::type_error("Converting circular structure to JSON"));
                }
                let result = self.serialize_object(cx, &value, indent);
                self.seen.remove(&id);
                result.map(Some)
            }
        }
    }

    fn transform(
        &mut self,
        cx: &mut NativeContext,
        holder: &Value,
        key: &str,
        value: Value,
    ) -> VmResult<Value> {
        match &self.replacer {
            Some(replacer) => {
                let replacer = replacer.clone();
                cx.call(&replacer, holder, &[Value::string(key), value])
            }
            None => Ok(value),
        }
    }

    fn serialize_array(
        &mut self,
        cx: &mut NativeContext,
        value: &Value,
        indent: &str,
    ) -> VmResult<String> {
        let arr = value.as_array_object().expect("array kind").clone();
        let inner = format!("{indent}{}", self.gap);
        let mut parts = Vec::with_capacity(arr.elements_len());
        for (i, item) in arr.elements_snapshot().into_iter().enumerate() {
            let item = self.transform(cx, value, &i.to_string(), item)?;
            let text = self
                .serialize(cx, item, &inner)?
                .unwrap_or_else(|| "null".to_string());
            parts.push(text);
        }
        Ok(join_group("[", "]", &parts, indent, &inner, &self.gap))
    }

    fn serialize_object(
        &mut self,
        cx: &mut NativeContext,
        value: &Value,
        indent: &str,
    ) -> VmResult<String> {
        let obj = value.as_object().expect("object kind");
        let inner = format!("{indent}{}", self.gap);
        let mut parts = Vec::new();
        for key in obj.enumerable_string_keys() {
            let name = key.display();
            if let Some(allowed) = &self.allow_list {
                if !allowed.contains(&name) {
                    continue;
                }
            }
            let raw = cx.get(value, &key)?;
            let transformed = self.transform(cx, value, &name, raw)?;
            if let Some(text) = self.serialize(cx, transformed, &inner)? {
                let sep = if self.gap.is_empty() { ":" } else { ": " };
                parts.push(format!("{}{sep}{text}", quote(&name)));
            }
        }
        Ok(join_group("{", "}", &parts, indent, &inner, &self.gap))
    }
}

fn join_group(
    open: &str,
    close: &str,
    parts: &[String],
    indent: &str,
    inner: &str,
    gap: &str,
) -> String {
    if parts.is_empty() {
        return format!("{open}{close}");
    }
    if gap.is_empty() {
        format!("{open}{}{close}", parts.join(","))
    } else {
        format!(
            "{open}\n{inner}{}\n{indent}{close}",
            parts.join(&format!(",\n{inner}"))
        )
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
