//! The `console` namespace, emitting through `tracing`.

use paserati_vm_core::builtin_builder::NamespaceBuilder;
use paserati_vm_core::{NativeContext, Value, VmResult};

use crate::types::{Type, TypeContext};
use crate::{Builtin, RuntimeContext, priority};

pub struct ConsoleBuiltin;

impl Builtin for ConsoleBuiltin {
    fn name(&self) -> &'static str {
        "console"
    }

    fn priority(&self) -> u32 {
        priority::CONSOLE
    }

    fn init_types(&self, tcx: &mut dyn TypeContext) {
        let log = Type::function(vec![Type::Any], Type::Void);
        tcx.define_global(
            "console",
            Type::Object(vec![
                ("log".into(), log.clone()),
                ("info".into(), log.clone()),
                ("warn".into(), log.clone()),
                ("error".into(), log.clone()),
                ("debug".into(), log),
            ]),
        );
    }

    fn init_runtime(&self, rcx: &mut RuntimeContext<'_>) -> VmResult<()> {
        let realm = rcx.realm();
        let ns = NamespaceBuilder::new(&realm)
            .method("log", |_t, args, cx| emit(args, cx, Level::Info), 0)
            .method("info", |_t, args, cx| emit(args, cx, Level::Info), 0)
            .method("warn", |_t, args, cx| emit(args, cx, Level::Warn), 0)
            .method("error", |_t, args, cx| emit(args, cx, Level::Error), 0)
            .method("debug", |_t, args, cx| emit(args, cx, Level::Debug), 0)
            .build();
        rcx.define_global("console", ns);
        Ok(())
    }
}

enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

fn emit(args: &[Value], cx: &mut NativeContext, level: Level) -> VmResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(display(cx, value)?);
    }
    let line = parts.join(" ");
    match level {
        Level::Debug => tracing::debug!(target: "paserati::console", "{line}"),
        Level::Info => tracing::info!(target: "paserati::console", "{line}"),
        Level::Warn => tracing::warn!(target: "paserati::console", "{line}"),
        Level::Error => tracing::error!(target: "paserati::console", "{line}"),
    }
    Ok(Value::Undefined)
}

/// Console rendering: strings print bare, everything else goes through the
/// language's string coercion with a structural fallback.
fn display(cx: &mut NativeContext, value: &Value) -> VmResult<String> {
    match value {
        Value::String(s) => Ok(s.as_str().to_string()),
        Value::Symbol(sym) => Ok(sym.to_string()),
        Value::Array(arr) => {
            let mut parts = Vec::with_capacity(arr.elements_len());
            for item in arr.elements_snapshot() {
                parts.push(display(cx, &item)?);
            }
            Ok(format!("[ {} ]", parts.join(", ")))
        }
        other if other.is_object() => Ok(match cx.to_string_value(other) {
            Ok(s) => s.as_str().to_string(),
            Err(_) => format!("{other:?}"),
        }),
        other => Ok(paserati_vm_core::convert::primitive_to_string(other)
            .unwrap_or_else(|_| format!("{other:?}"))),
    }
}
