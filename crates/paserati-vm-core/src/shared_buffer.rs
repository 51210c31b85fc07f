//! SharedArrayBuffer: byte storage shared across worker threads.
//!
//! Unlike `ArrayBuffer` the storage itself is `Arc`-shared, so two values can
//! alias the same bytes across threads. Accesses are not atomic; explicit
//! atomics are out of scope. SharedArrayBuffers cannot be detached.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::gc::GcRef;
use crate::object::JsObject;

/// A JavaScript SharedArrayBuffer.
pub struct SharedArrayBuffer {
    pub object: GcRef<JsObject>,
    data: Arc<RwLock<Vec<u8>>>,
}

impl SharedArrayBuffer {
    pub fn new(byte_length: usize, prototype: Option<GcRef<JsObject>>) -> GcRef<SharedArrayBuffer> {
        GcRef::new(Self {
            object: JsObject::alloc(prototype),
            data: Arc::new(RwLock::new(vec![0; byte_length])),
        })
    }

    /// A second value over the same storage (e.g. after structured handoff
    /// to a worker).
    pub fn alias(&self, prototype: Option<GcRef<JsObject>>) -> GcRef<SharedArrayBuffer> {
        GcRef::new(Self {
            object: JsObject::alloc(prototype),
            data: Arc::clone(&self.data),
        })
    }

    pub fn byte_length(&self) -> usize {
        self.data.read().len()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.read())
    }

    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(self.data.write().as_mut_slice())
    }

    /// Copy out `[start, end)` clamped to the buffer.
    pub fn slice_bytes(&self, start: usize, end: usize) -> Vec<u8> {
        let data = self.data.read();
        let len = data.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        data[start..end].to_vec()
    }
}

impl std::fmt::Debug for SharedArrayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedArrayBuffer({})", self.byte_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_bytes() {
        let a = SharedArrayBuffer::new(4, None);
        let b = a.alias(None);
        a.with_data_mut(|d| d[0] = 9);
        assert_eq!(b.with_data(|d| d[0]), 9);
    }

    #[test]
    fn test_cross_thread_writes_visible() {
        let a = SharedArrayBuffer::new(8, None);
        let b = a.alias(None);
        let handle = std::thread::spawn(move || {
            b.with_data_mut(|d| d[3] = 42);
        });
        handle.join().unwrap();
        assert_eq!(a.with_data(|d| d[3]), 42);
    }
}
