//! Symbols: identity plus an optional description.
//!
//! Well-known symbols are allocated once per process with fixed ids and
//! exposed through [`WellKnownSymbols`]; everything else gets a fresh id from
//! a global counter, so two symbols are equal only when they are the same
//! allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::gc::GcRef;
use crate::string::JsString;

/// Unique symbol identifier.
pub type SymbolId = u64;

/// Fixed ids for the well-known symbols. Fresh symbols start above these.
pub mod well_known {
    pub const ITERATOR: u64 = 1;
    pub const ASYNC_ITERATOR: u64 = 2;
    pub const TO_STRING_TAG: u64 = 3;
    pub const HAS_INSTANCE: u64 = 4;
    pub const TO_PRIMITIVE: u64 = 5;
    pub const IS_CONCAT_SPREADABLE: u64 = 6;
    pub const MATCH: u64 = 7;
    pub const REPLACE: u64 = 8;
    pub const SEARCH: u64 = 9;
    pub const SPLIT: u64 = 10;
    pub const SPECIES: u64 = 11;
    pub const UNSCOPABLES: u64 = 12;
}

const FIRST_DYNAMIC_ID: u64 = 64;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(FIRST_DYNAMIC_ID);

/// A JavaScript symbol.
#[derive(Debug)]
pub struct JsSymbol {
    /// Unique id; equality and property-key hashing use this.
    pub id: SymbolId,
    /// Optional description, surfaced by `Symbol.prototype.description`.
    pub description: Option<JsString>,
}

impl JsSymbol {
    /// Allocate a fresh symbol with a new identity.
    pub fn new(description: Option<JsString>) -> GcRef<JsSymbol> {
        GcRef::new(JsSymbol {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description,
        })
    }

    fn fixed(id: SymbolId, description: &str) -> GcRef<JsSymbol> {
        GcRef::new(JsSymbol {
            id,
            description: Some(JsString::intern(description)),
        })
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for JsSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(d) => write!(f, "Symbol({d})"),
            None => write!(f, "Symbol()"),
        }
    }
}

/// The well-known symbols, allocated once per process and shared by every
/// realm (their identity is observable across realms).
pub struct WellKnownSymbols {
    pub iterator: GcRef<JsSymbol>,
    pub async_iterator: GcRef<JsSymbol>,
    pub to_string_tag: GcRef<JsSymbol>,
    pub has_instance: GcRef<JsSymbol>,
    pub to_primitive: GcRef<JsSymbol>,
    pub is_concat_spreadable: GcRef<JsSymbol>,
    pub r#match: GcRef<JsSymbol>,
    pub replace: GcRef<JsSymbol>,
    pub search: GcRef<JsSymbol>,
    pub split: GcRef<JsSymbol>,
    pub species: GcRef<JsSymbol>,
    pub unscopables: GcRef<JsSymbol>,
}

static WELL_KNOWN: OnceLock<WellKnownSymbols> = OnceLock::new();

/// The process-wide well-known symbol set.
pub fn well_known_symbols() -> &'static WellKnownSymbols {
    WELL_KNOWN.get_or_init(|| WellKnownSymbols {
        iterator: JsSymbol::fixed(well_known::ITERATOR, "Symbol.iterator"),
        async_iterator: JsSymbol::fixed(well_known::ASYNC_ITERATOR, "Symbol.asyncIterator"),
        to_string_tag: JsSymbol::fixed(well_known::TO_STRING_TAG, "Symbol.toStringTag"),
        has_instance: JsSymbol::fixed(well_known::HAS_INSTANCE, "Symbol.hasInstance"),
        to_primitive: JsSymbol::fixed(well_known::TO_PRIMITIVE, "Symbol.toPrimitive"),
        is_concat_spreadable: JsSymbol::fixed(
            well_known::IS_CONCAT_SPREADABLE,
            "Symbol.isConcatSpreadable",
        ),
        r#match: JsSymbol::fixed(well_known::MATCH, "Symbol.match"),
        replace: JsSymbol::fixed(well_known::REPLACE, "Symbol.replace"),
        search: JsSymbol::fixed(well_known::SEARCH, "Symbol.search"),
        split: JsSymbol::fixed(well_known::SPLIT, "Symbol.split"),
        species: JsSymbol::fixed(well_known::SPECIES, "Symbol.species"),
        unscopables: JsSymbol::fixed(well_known::UNSCOPABLES, "Symbol.unscopables"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_symbols_are_distinct() {
        let a = JsSymbol::new(Some(JsString::intern("x")));
        let b = JsSymbol::new(Some(JsString::intern("x")));
        assert_ne!(a.id, b.id);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_well_known_identity_is_stable() {
        let first = well_known_symbols().iterator.clone();
        let second = well_known_symbols().iterator.clone();
        assert!(GcRef::ptr_eq(&first, &second));
        assert_eq!(first.id, well_known::ITERATOR);
    }
}
