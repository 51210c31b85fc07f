//! RegExp values: a compiled pattern plus its flags.
//!
//! Only the value kind lives here; matching semantics belong to the RegExp
//! builtin surface, which is outside this runtime core. Compilation through
//! `regress` validates the pattern eagerly so malformed patterns fail at
//! construction.

use crate::error::{VmError, VmResult};
use crate::gc::GcRef;
use crate::object::JsObject;

/// A JavaScript RegExp.
pub struct JsRegExp {
    pub object: GcRef<JsObject>,
    pub pattern: String,
    pub flags: String,
    compiled: regress::Regex,
}

impl JsRegExp {
    pub fn new(
        pattern: &str,
        flags: &str,
        prototype: Option<GcRef<JsObject>>,
    ) -> VmResult<GcRef<JsRegExp>> {
        let compiled = regress::Regex::with_flags(pattern, flags)
            .map_err(|e| VmError::syntax_error(format!("Invalid regular expression: {e}")))?;
        Ok(GcRef::new(Self {
            object: JsObject::alloc(prototype),
            pattern: pattern.to_string(),
            flags: flags.to_string(),
            compiled,
        }))
    }

    /// First match position in `haystack`, if any.
    pub fn find(&self, haystack: &str) -> Option<std::ops::Range<usize>> {
        self.compiled.find(haystack).map(|m| m.range())
    }

    /// `/pattern/flags` source form.
    pub fn source_text(&self) -> String {
        format!("/{}/{}", self.pattern, self.flags)
    }
}

impl std::fmt::Debug for JsRegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_find() {
        let re = JsRegExp::new("a+b", "", None).unwrap();
        assert_eq!(re.find("xxaab"), Some(2..5));
        assert!(re.find("xyz").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_syntax_error() {
        let err = JsRegExp::new("(", "", None).unwrap_err();
        assert!(matches!(err, VmError::SyntaxError(_)));
    }
}
