//! Immutable runtime strings.
//!
//! Strings are UTF-8, immutable, and compare by contents. Short literal
//! strings (property names, builtin method names) go through a process-wide
//! intern table so repeated installs share one allocation.

use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

/// Strings above this length bypass the intern table.
const INTERN_LIMIT: usize = 64;

static INTERN_TABLE: OnceLock<DashMap<String, JsString>> = OnceLock::new();

fn intern_table() -> &'static DashMap<String, JsString> {
    INTERN_TABLE.get_or_init(DashMap::new)
}

/// An immutable JavaScript string.
#[derive(Clone)]
pub struct JsString(Arc<str>);

impl JsString {
    /// Create a string, interning short ones.
    pub fn intern(s: &str) -> Self {
        if s.len() > INTERN_LIMIT {
            return Self(Arc::from(s));
        }
        if let Some(existing) = intern_table().get(s) {
            return existing.clone();
        }
        let value = Self(Arc::from(s));
        intern_table().insert(s.to_string(), value.clone());
        value
    }

    /// Create a string without consulting the intern table.
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of UTF-16 code units, which is what `length` reports.
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }
}

impl PartialEq for JsString {
    fn eq(&self, other: &Self) -> bool {
        // Interned strings usually share the allocation; fall back to contents.
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for JsString {}

impl std::hash::Hash for JsString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl std::fmt::Display for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for JsString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        Self::intern(s)
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        if s.len() > INTERN_LIMIT {
            Self(Arc::from(s))
        } else {
            Self::intern(&s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interned_strings_share_storage() {
        let a = JsString::intern("name");
        let b = JsString::intern("name");
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_equality_by_contents() {
        let a = JsString::new("hello world");
        let b = JsString::new("hello world");
        assert_eq!(a, b);
        assert_ne!(a, JsString::new("hello"));
    }

    #[test]
    fn test_utf16_len() {
        assert_eq!(JsString::intern("abc").utf16_len(), 3);
        assert_eq!(JsString::intern("\u{1F600}").utf16_len(), 2);
    }
}
