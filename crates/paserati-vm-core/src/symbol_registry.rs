//! The global symbol registry backing `Symbol.for` / `Symbol.keyFor`.
//!
//! Process-wide shared state: the registry deliberately crosses realm
//! boundaries, so it lives behind a reader-writer lock rather than inside
//! any realm.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, OnceLock};

use crate::gc::GcRef;
use crate::string::JsString;
use crate::symbol::JsSymbol;

pub struct SymbolRegistry {
    map: RwLock<FxHashMap<String, GcRef<JsSymbol>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
        }
    }

    /// `Symbol.for`: return the symbol registered under `key`, creating and
    /// registering a fresh one on first use.
    pub fn get_or_insert(&self, key: &str) -> GcRef<JsSymbol> {
        if let Some(existing) = self.map.read().get(key) {
            return existing.clone();
        }
        let mut map = self.map.write();
        // Double-checked: another thread may have won the race.
        if let Some(existing) = map.get(key) {
            return existing.clone();
        }
        let symbol = JsSymbol::new(Some(JsString::intern(key)));
        map.insert(key.to_string(), symbol.clone());
        symbol
    }

    /// `Symbol.keyFor`: the registration key of `symbol`, or `None` for
    /// unregistered symbols.
    pub fn key_for(&self, symbol: &GcRef<JsSymbol>) -> Option<String> {
        let map = self.map.read();
        map.iter()
            .find(|(_, v)| v.id == symbol.id)
            .map(|(k, _)| k.clone())
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_SYMBOL_REGISTRY: OnceLock<Arc<SymbolRegistry>> = OnceLock::new();

/// The process-wide registry shared by every realm.
pub fn global_symbol_registry() -> Arc<SymbolRegistry> {
    GLOBAL_SYMBOL_REGISTRY
        .get_or_init(|| Arc::new(SymbolRegistry::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_returns_same_symbol() {
        let registry = SymbolRegistry::new();
        let a = registry.get_or_insert("app.key");
        let b = registry.get_or_insert("app.key");
        assert_eq!(a.id, b.id);
        assert!(GcRef::ptr_eq(&a, &b));
    }

    #[test]
    fn test_key_for() {
        let registry = SymbolRegistry::new();
        let sym = registry.get_or_insert("shared");
        assert_eq!(registry.key_for(&sym).as_deref(), Some("shared"));

        let unregistered = JsSymbol::new(None);
        assert!(registry.key_for(&unregistered).is_none());
    }
}
