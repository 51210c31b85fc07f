//! ArrayBuffer: a mutable byte buffer with a one-way detached flag.

use parking_lot::RwLock;

use crate::gc::GcRef;
use crate::object::JsObject;

/// A JavaScript ArrayBuffer.
///
/// `data` is `None` once detached; every typed-array operation over a view of
/// a detached buffer must throw.
pub struct JsArrayBuffer {
    pub object: GcRef<JsObject>,
    data: RwLock<Option<Vec<u8>>>,
}

impl JsArrayBuffer {
    pub fn new(byte_length: usize, prototype: Option<GcRef<JsObject>>) -> GcRef<JsArrayBuffer> {
        GcRef::new(Self {
            object: JsObject::alloc(prototype),
            data: RwLock::new(Some(vec![0; byte_length])),
        })
    }

    pub fn from_bytes(bytes: Vec<u8>, prototype: Option<GcRef<JsObject>>) -> GcRef<JsArrayBuffer> {
        GcRef::new(Self {
            object: JsObject::alloc(prototype),
            data: RwLock::new(Some(bytes)),
        })
    }

    pub fn is_detached(&self) -> bool {
        self.data.read().is_none()
    }

    /// Release the backing storage. Detach is one-way.
    pub fn detach(&self) {
        *self.data.write() = None;
    }

    /// Byte length; 0 once detached.
    pub fn byte_length(&self) -> usize {
        self.data.read().as_ref().map_or(0, Vec::len)
    }

    /// Copy out `[start, end)` clamped to the buffer, as a fresh byte vector.
    pub fn slice_bytes(&self, start: usize, end: usize) -> Option<Vec<u8>> {
        let guard = self.data.read();
        let data = guard.as_ref()?;
        let len = data.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        Some(data[start..end].to_vec())
    }

    /// Borrow the bytes. Returns `None` if detached.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let guard = self.data.read();
        guard.as_ref().map(|d| f(d))
    }

    /// Borrow the bytes mutably. Returns `None` if detached.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut guard = self.data.write();
        guard.as_mut().map(|d| f(d.as_mut_slice()))
    }
}

impl std::fmt::Debug for JsArrayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_detached() {
            write!(f, "ArrayBuffer(detached)")
        } else {
            write!(f, "ArrayBuffer({})", self.byte_length())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_length() {
        let ab = JsArrayBuffer::new(16, None);
        assert_eq!(ab.byte_length(), 16);
        assert!(!ab.is_detached());
    }

    #[test]
    fn test_detach_is_one_way() {
        let ab = JsArrayBuffer::new(8, None);
        ab.detach();
        assert!(ab.is_detached());
        assert_eq!(ab.byte_length(), 0);
        assert!(ab.with_data(|_| ()).is_none());
        assert!(ab.slice_bytes(0, 4).is_none());
    }

    #[test]
    fn test_slice_clamps() {
        let ab = JsArrayBuffer::from_bytes(vec![1, 2, 3, 4], None);
        assert_eq!(ab.slice_bytes(1, 3).unwrap(), vec![2, 3]);
        assert_eq!(ab.slice_bytes(2, 100).unwrap(), vec![3, 4]);
        assert_eq!(ab.slice_bytes(10, 20).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_mutation() {
        let ab = JsArrayBuffer::new(4, None);
        ab.with_data_mut(|d| d[2] = 7).unwrap();
        assert_eq!(ab.with_data(|d| d[2]).unwrap(), 7);
    }
}
