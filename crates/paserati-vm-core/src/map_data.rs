//! Backing storage for `Map` and `Set`.
//!
//! Entries live in a `Vec` in insertion order; deletion tombstones the slot
//! in place (`None`) instead of compacting, so live iterators skip deleted
//! entries and still observe entries appended after they were created. A
//! side `HashMap` gives O(1) key→index lookup. `size` counts live entries
//! only.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::convert::MapKey;
use crate::gc::GcRef;
use crate::object::JsObject;
use crate::value::Value;

/// Internal storage for a JavaScript `Map`.
pub struct MapData {
    inner: RwLock<MapDataInner>,
}

struct MapDataInner {
    /// Insertion-ordered entries. `None` = tombstone.
    entries: Vec<Option<(MapKey, Value)>>,
    /// Key → index in `entries`.
    index: FxHashMap<MapKey, usize>,
    /// Live entry count.
    size: usize,
}

impl Default for MapData {
    fn default() -> Self {
        Self::new()
    }
}

impl MapData {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MapDataInner {
                entries: Vec::new(),
                index: FxHashMap::default(),
                size: 0,
            }),
        }
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        let inner = self.inner.read();
        let idx = *inner.index.get(key)?;
        match inner.entries.get(idx) {
            Some(Some((_, v))) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn has(&self, key: &MapKey) -> bool {
        self.inner.read().index.contains_key(key)
    }

    /// Insert or update. An update rewrites the live slot in place so the
    /// entry keeps its original position; only a fresh key appends.
    /// Returns `true` when this was an update.
    pub fn set(&self, key: MapKey, value: Value) -> bool {
        let mut inner = self.inner.write();
        if let Some(&idx) = inner.index.get(&key) {
            inner.entries[idx] = Some((key, value));
            true
        } else {
            let idx = inner.entries.len();
            inner.index.insert(key.clone(), idx);
            inner.entries.push(Some((key, value)));
            inner.size += 1;
            false
        }
    }

    /// Delete `key`, leaving a tombstone. Returns `true` if it existed.
    pub fn delete(&self, key: &MapKey) -> bool {
        let mut inner = self.inner.write();
        if let Some(idx) = inner.index.remove(key) {
            inner.entries[idx] = None;
            inner.size -= 1;
            true
        } else {
            false
        }
    }

    /// Tombstone every entry; live iterators see "done".
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        for entry in inner.entries.iter_mut() {
            *entry = None;
        }
        inner.index.clear();
        inner.size = 0;
    }

    /// Entry at `position` for iterator advancement; `None` for tombstones
    /// and positions past the end.
    pub fn entry_at(&self, position: usize) -> Option<(Value, Value)> {
        let inner = self.inner.read();
        match inner.entries.get(position) {
            Some(Some((k, v))) => Some((k.value().clone(), v.clone())),
            _ => None,
        }
    }

    /// Length of the entry vector including tombstones; iterators are
    /// exhausted once their cursor reaches this.
    pub fn entries_len(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl std::fmt::Debug for MapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MapData(size={})", self.size())
    }
}

/// Internal storage for a JavaScript `Set`: the same tombstone design,
/// keys only.
pub struct SetData {
    inner: RwLock<SetDataInner>,
}

struct SetDataInner {
    entries: Vec<Option<MapKey>>,
    index: FxHashMap<MapKey, usize>,
    size: usize,
}

impl Default for SetData {
    fn default() -> Self {
        Self::new()
    }
}

impl SetData {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SetDataInner {
                entries: Vec::new(),
                index: FxHashMap::default(),
                size: 0,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn has(&self, key: &MapKey) -> bool {
        self.inner.read().index.contains_key(key)
    }

    /// Add a value; present values are a no-op. Returns `true` if already
    /// present.
    pub fn add(&self, key: MapKey) -> bool {
        let mut inner = self.inner.write();
        if inner.index.contains_key(&key) {
            return true;
        }
        let idx = inner.entries.len();
        inner.index.insert(key.clone(), idx);
        inner.entries.push(Some(key));
        inner.size += 1;
        false
    }

    pub fn delete(&self, key: &MapKey) -> bool {
        let mut inner = self.inner.write();
        if let Some(idx) = inner.index.remove(key) {
            inner.entries[idx] = None;
            inner.size -= 1;
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        for entry in inner.entries.iter_mut() {
            *entry = None;
        }
        inner.index.clear();
        inner.size = 0;
    }

    pub fn entry_at(&self, position: usize) -> Option<Value> {
        let inner = self.inner.read();
        match inner.entries.get(position) {
            Some(Some(k)) => Some(k.value().clone()),
            _ => None,
        }
    }

    pub fn entries_len(&self) -> usize {
        self.inner.read().entries.len()
    }
}

impl std::fmt::Debug for SetData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SetData(size={})", self.size())
    }
}

/// A `Map` value: entry storage plus the property-carrying object part.
#[derive(Debug)]
pub struct JsMap {
    pub object: GcRef<JsObject>,
    pub data: MapData,
}

impl JsMap {
    pub fn new(prototype: Option<GcRef<JsObject>>) -> GcRef<JsMap> {
        GcRef::new(JsMap {
            object: JsObject::alloc(prototype),
            data: MapData::new(),
        })
    }
}

/// A `Set` value.
#[derive(Debug)]
pub struct JsSet {
    pub object: GcRef<JsObject>,
    pub data: SetData,
}

impl JsSet {
    pub fn new(prototype: Option<GcRef<JsObject>>) -> GcRef<JsSet> {
        GcRef::new(JsSet {
            object: JsObject::alloc(prototype),
            data: SetData::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: Value) -> MapKey {
        MapKey::new(v)
    }

    #[test]
    fn test_set_get_delete() {
        let map = MapData::new();
        assert!(!map.set(key(Value::string("a")), Value::int32(1)));
        assert_eq!(map.size(), 1);
        assert_eq!(
            map.get(&key(Value::string("a"))).unwrap().as_int32(),
            Some(1)
        );
        assert!(map.delete(&key(Value::string("a"))));
        assert_eq!(map.size(), 0);
        assert!(map.get(&key(Value::string("a"))).is_none());
    }

    #[test]
    fn test_reset_updates_in_place() {
        let map = MapData::new();
        map.set(key(Value::string("x")), Value::int32(1));
        map.set(key(Value::string("y")), Value::int32(2));
        assert!(map.set(key(Value::string("x")), Value::int32(3)));

        // "x" keeps slot 0; no new entry was appended.
        assert_eq!(map.entries_len(), 2);
        let (k, v) = map.entry_at(0).unwrap();
        assert_eq!(k.as_string().unwrap().as_str(), "x");
        assert_eq!(v.as_int32(), Some(3));
    }

    #[test]
    fn test_tombstone_skipped_but_position_kept() {
        let map = MapData::new();
        map.set(key(Value::string("a")), Value::int32(1));
        map.set(key(Value::string("b")), Value::int32(2));
        map.set(key(Value::string("c")), Value::int32(3));

        map.delete(&key(Value::string("b")));
        assert_eq!(map.size(), 2);
        // The slot is tombstoned, not compacted.
        assert_eq!(map.entries_len(), 3);
        assert!(map.entry_at(1).is_none());
        assert!(map.entry_at(2).is_some());
    }

    #[test]
    fn test_rekey_appends() {
        let map = MapData::new();
        map.set(key(Value::string("a")), Value::int32(1));
        map.set(key(Value::string("b")), Value::int32(2));
        map.delete(&key(Value::string("a")));
        map.set(key(Value::string("a")), Value::int32(9));

        // Delete + set of the same key appends a new entry.
        assert_eq!(map.entries_len(), 3);
        let (k, v) = map.entry_at(2).unwrap();
        assert_eq!(k.as_string().unwrap().as_str(), "a");
        assert_eq!(v.as_int32(), Some(9));
    }

    #[test]
    fn test_nan_key_same_value_zero() {
        let map = MapData::new();
        map.set(key(Value::Float(f64::NAN)), Value::int32(1));
        assert!(map.has(&key(Value::Float(f64::NAN))));
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn test_clear() {
        let map = MapData::new();
        map.set(key(Value::int32(1)), Value::int32(1));
        map.set(key(Value::int32(2)), Value::int32(2));
        map.clear();
        assert_eq!(map.size(), 0);
        assert!(map.entry_at(0).is_none());
        assert!(map.entry_at(1).is_none());
    }

    #[test]
    fn test_set_data() {
        let set = SetData::new();
        assert!(!set.add(key(Value::int32(1))));
        assert!(set.add(key(Value::int32(1))));
        assert_eq!(set.size(), 1);
        assert!(set.delete(&key(Value::int32(1))));
        assert_eq!(set.size(), 0);
    }
}
