//! Runtime error types.
//!
//! Builtins signal failures by returning a [`VmError`] through the unwinding
//! channel; the interpreter propagates it as a thrown value until a handler
//! catches it. Native code never substitutes a default where the language
//! requires a throw.

use crate::value::Value;
use thiserror::Error;

/// Errors raised by the runtime core and builtins.
#[derive(Debug, Error)]
pub enum VmError {
    /// Wrong kind of value, wrong `this`, detached buffer, non-callable
    /// callback, reused body.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Undefined variable or unresolvable reference.
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Negative length, misaligned offset, invalid redirect status.
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Malformed JSON, malformed base64/hex, invalid options.
    #[error("SyntaxError: {0}")]
    SyntaxError(String),

    /// Cancellation via an abort signal; carries the signal's reason.
    #[error("AbortError: {0}")]
    AbortError(String),

    /// Network or I/O failure surfaced from a host operation.
    #[error("{0}")]
    HostError(String),

    /// Invariant violation inside the runtime itself.
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Stack overflow in native re-entry.
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// A thrown JavaScript value (e.g. `throw obj` crossing a native frame).
    #[error("Uncaught exception: {0}")]
    Exception(Box<ThrownValue>),
}

/// A thrown JavaScript value crossing the native boundary.
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value itself.
    pub value: Value,
    /// String rendering for host-side display.
    pub message: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A native frame recorded for stack traces.
#[derive(Debug, Clone)]
pub struct StackFrame {
    /// Function name, or `"<anonymous>"`.
    pub function_name: String,
}

impl VmError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    pub fn syntax_error(msg: impl Into<String>) -> Self {
        Self::SyntaxError(msg.into())
    }

    pub fn abort_error(msg: impl Into<String>) -> Self {
        Self::AbortError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap a thrown JS value.
    pub fn exception(value: Value) -> Self {
        let message = match &value {
            Value::String(s) => s.as_str().to_string(),
            other => format!("{other:?}"),
        };
        Self::Exception(Box::new(ThrownValue { value, message }))
    }

    /// The error rendered the way a rejected promise reason reads.
    pub fn reason_string(&self) -> String {
        self.to_string()
    }
}

/// Result type for runtime operations.
pub type VmResult<T> = Result<T, VmError>;
