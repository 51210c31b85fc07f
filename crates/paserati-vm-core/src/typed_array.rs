//! Typed arrays: element-typed views over array buffers.
//!
//! A view is `{ kind, buffer, byte_offset, length }`. All eleven element
//! kinds share one implementation; writes go through the kind's coercion
//! (modular wrap for integers, saturation with round-half-to-even for
//! Uint8Clamped, f32 rounding, 64-bit modular reduction for the BigInt
//! kinds). Byte order is little-endian.

use crate::array_buffer::JsArrayBuffer;
use crate::bigint::JsBigInt;
use crate::gc::GcRef;
use crate::object::JsObject;
use crate::shared_buffer::SharedArrayBuffer;
use crate::value::Value;

/// Element kind; decides size, coercion, and constructor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl TypedArrayKind {
    pub const ALL: [TypedArrayKind; 11] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
        TypedArrayKind::BigInt64,
        TypedArrayKind::BigUint64,
    ];

    /// BYTES_PER_ELEMENT.
    pub fn element_size(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 | Self::BigInt64 | Self::BigUint64 => 8,
        }
    }

    /// Constructor name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int8 => "Int8Array",
            Self::Uint8 => "Uint8Array",
            Self::Uint8Clamped => "Uint8ClampedArray",
            Self::Int16 => "Int16Array",
            Self::Uint16 => "Uint16Array",
            Self::Int32 => "Int32Array",
            Self::Uint32 => "Uint32Array",
            Self::Float32 => "Float32Array",
            Self::Float64 => "Float64Array",
            Self::BigInt64 => "BigInt64Array",
            Self::BigUint64 => "BigUint64Array",
        }
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self, Self::BigInt64 | Self::BigUint64)
    }
}

/// Uint8Clamped write coercion: NaN → 0, saturate to [0, 255], ties round
/// to even.
pub fn clamp_to_uint8(value: f64) -> u8 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    if value >= 255.0 {
        return 255;
    }
    let floor = value.floor();
    if value - floor == 0.5 {
        let f = floor as u16;
        (if f % 2 == 0 { f } else { f + 1 }) as u8
    } else {
        value.round() as u8
    }
}

/// The backing buffer of a view: plain or shared.
#[derive(Clone, Debug)]
pub enum BufferRef {
    Plain(GcRef<JsArrayBuffer>),
    Shared(GcRef<SharedArrayBuffer>),
}

impl BufferRef {
    pub fn byte_length(&self) -> usize {
        match self {
            Self::Plain(b) => b.byte_length(),
            Self::Shared(b) => b.byte_length(),
        }
    }

    pub fn is_detached(&self) -> bool {
        match self {
            Self::Plain(b) => b.is_detached(),
            // SharedArrayBuffers cannot be detached.
            Self::Shared(_) => false,
        }
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        match self {
            Self::Plain(b) => b.with_data(f),
            Self::Shared(b) => Some(b.with_data(f)),
        }
    }

    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        match self {
            Self::Plain(b) => b.with_data_mut(f),
            Self::Shared(b) => Some(b.with_data_mut(f)),
        }
    }

    pub fn as_value(&self) -> Value {
        match self {
            Self::Plain(b) => Value::ArrayBuffer(b.clone()),
            Self::Shared(b) => Value::SharedArrayBuffer(b.clone()),
        }
    }
}

/// A JavaScript typed array.
#[derive(Debug)]
pub struct JsTypedArray {
    pub object: GcRef<JsObject>,
    buffer: BufferRef,
    byte_offset: usize,
    length: usize,
    kind: TypedArrayKind,
}

impl JsTypedArray {
    /// View over an existing buffer. The caller validates alignment and
    /// bounds (those produce RangeErrors at the builtin layer); this
    /// constructor enforces them as internal invariants.
    pub fn new(
        object: GcRef<JsObject>,
        buffer: BufferRef,
        kind: TypedArrayKind,
        byte_offset: usize,
        length: usize,
    ) -> Result<GcRef<JsTypedArray>, &'static str> {
        let elem = kind.element_size();
        if byte_offset % elem != 0 {
            return Err("byte offset must be a multiple of the element size");
        }
        let byte_length = length
            .checked_mul(elem)
            .ok_or("typed array length overflow")?;
        if byte_offset
            .checked_add(byte_length)
            .is_none_or(|end| end > buffer.byte_length())
        {
            return Err("typed array extends past the end of its buffer");
        }
        Ok(GcRef::new(Self {
            object,
            buffer,
            byte_offset,
            length,
            kind,
        }))
    }

    /// Fresh view over a newly allocated buffer of `length` elements.
    pub fn with_length(
        kind: TypedArrayKind,
        length: usize,
        prototype: Option<GcRef<JsObject>>,
        buffer_prototype: Option<GcRef<JsObject>>,
    ) -> GcRef<JsTypedArray> {
        let buffer = JsArrayBuffer::new(length * kind.element_size(), buffer_prototype);
        GcRef::new(Self {
            object: JsObject::alloc(prototype),
            buffer: BufferRef::Plain(buffer),
            byte_offset: 0,
            length,
            kind,
        })
    }

    pub fn kind(&self) -> TypedArrayKind {
        self.kind
    }

    pub fn buffer(&self) -> &BufferRef {
        &self.buffer
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn byte_length(&self) -> usize {
        if self.buffer.is_detached() {
            0
        } else {
            self.length * self.kind.element_size()
        }
    }

    /// Element count; 0 once the backing buffer is detached.
    pub fn length(&self) -> usize {
        if self.buffer.is_detached() {
            0
        } else {
            self.length
        }
    }

    pub fn is_detached(&self) -> bool {
        self.buffer.is_detached()
    }

    /// Read element `index` as a runtime value (number, or BigInt for the
    /// 64-bit kinds). `None` out of bounds or detached.
    pub fn get(&self, index: usize) -> Option<Value> {
        if self.buffer.is_detached() || index >= self.length {
            return None;
        }
        let at = self.byte_offset + index * self.kind.element_size();
        self.buffer.with_data(|data| {
            let b = &data[at..];
            match self.kind {
                TypedArrayKind::Int8 => Value::number(b[0] as i8 as f64),
                TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => Value::number(b[0] as f64),
                TypedArrayKind::Int16 => {
                    Value::number(i16::from_le_bytes([b[0], b[1]]) as f64)
                }
                TypedArrayKind::Uint16 => {
                    Value::number(u16::from_le_bytes([b[0], b[1]]) as f64)
                }
                TypedArrayKind::Int32 => {
                    Value::number(i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                }
                TypedArrayKind::Uint32 => {
                    Value::number(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                }
                TypedArrayKind::Float32 => {
                    Value::number(f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                }
                TypedArrayKind::Float64 => Value::number(f64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ])),
                TypedArrayKind::BigInt64 => Value::bigint(JsBigInt::from_i64(i64::from_le_bytes(
                    [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]],
                ))),
                TypedArrayKind::BigUint64 => Value::bigint(JsBigInt::from_u64(
                    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
                )),
            }
        })
    }

    /// Write a numeric value through the kind's coercion. The caller has
    /// already run ToNumber; BigInt kinds ignore this path.
    pub fn set_f64(&self, index: usize, value: f64) -> bool {
        if self.buffer.is_detached() || index >= self.length || self.kind.is_bigint() {
            return false;
        }
        let at = self.byte_offset + index * self.kind.element_size();
        self.buffer
            .with_data_mut(|data| {
                let b = &mut data[at..];
                match self.kind {
                    TypedArrayKind::Int8 => b[0] = crate::convert::to_int32(value) as u8,
                    TypedArrayKind::Uint8 => b[0] = crate::convert::to_uint32(value) as u8,
                    TypedArrayKind::Uint8Clamped => b[0] = clamp_to_uint8(value),
                    TypedArrayKind::Int16 => {
                        b[..2].copy_from_slice(
                            &(crate::convert::to_int32(value) as i16).to_le_bytes(),
                        );
                    }
                    TypedArrayKind::Uint16 => {
                        b[..2].copy_from_slice(
                            &(crate::convert::to_uint32(value) as u16).to_le_bytes(),
                        );
                    }
                    TypedArrayKind::Int32 => {
                        b[..4].copy_from_slice(&crate::convert::to_int32(value).to_le_bytes());
                    }
                    TypedArrayKind::Uint32 => {
                        b[..4].copy_from_slice(&crate::convert::to_uint32(value).to_le_bytes());
                    }
                    TypedArrayKind::Float32 => {
                        b[..4].copy_from_slice(&(value as f32).to_le_bytes());
                    }
                    TypedArrayKind::Float64 => {
                        b[..8].copy_from_slice(&value.to_le_bytes());
                    }
                    TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => unreachable!(),
                }
            })
            .is_some()
    }

    /// Write a BigInt value, wrapped to 64 bits. Only valid on the BigInt
    /// kinds.
    pub fn set_bigint(&self, index: usize, value: &JsBigInt) -> bool {
        if self.buffer.is_detached() || index >= self.length || !self.kind.is_bigint() {
            return false;
        }
        let at = self.byte_offset + index * self.kind.element_size();
        self.buffer
            .with_data_mut(|data| {
                let b = &mut data[at..];
                b[..8].copy_from_slice(&value.to_wrapped_u64().to_le_bytes());
            })
            .is_some()
    }

    /// A view over the same buffer covering `[begin, end)` elements.
    pub fn subarray(
        &self,
        object: GcRef<JsObject>,
        begin: usize,
        end: usize,
    ) -> Result<GcRef<JsTypedArray>, &'static str> {
        let begin = begin.min(self.length);
        let end = end.clamp(begin, self.length);
        Self::new(
            object,
            self.buffer.clone(),
            self.kind,
            self.byte_offset + begin * self.kind.element_size(),
            end - begin,
        )
    }

    /// Copy out the view's bytes. `None` if detached.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        if self.buffer.is_detached() {
            return None;
        }
        self.buffer.with_data(|data| {
            data[self.byte_offset..self.byte_offset + self.length * self.kind.element_size()]
                .to_vec()
        })
    }

    /// Overwrite the view's bytes starting at element `offset`.
    pub fn write_bytes(&self, offset_elements: usize, src: &[u8]) -> bool {
        let at = self.byte_offset + offset_elements * self.kind.element_size();
        let end = at + src.len();
        if end > self.byte_offset + self.length * self.kind.element_size() {
            return false;
        }
        self.buffer
            .with_data_mut(|data| data[at..end].copy_from_slice(src))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(kind: TypedArrayKind, len: usize) -> GcRef<JsTypedArray> {
        JsTypedArray::with_length(kind, len, None, None)
    }

    #[test]
    fn test_clamped_rounding() {
        assert_eq!(clamp_to_uint8(300.0), 255);
        assert_eq!(clamp_to_uint8(-1.0), 0);
        assert_eq!(clamp_to_uint8(f64::NAN), 0);
        // Ties round to even.
        assert_eq!(clamp_to_uint8(2.5), 2);
        assert_eq!(clamp_to_uint8(3.5), 4);
        assert_eq!(clamp_to_uint8(0.5), 0);
    }

    #[test]
    fn test_int8_wraps() {
        let arr = fresh(TypedArrayKind::Int8, 1);
        arr.set_f64(0, 130.0);
        assert_eq!(arr.get(0).unwrap().as_number(), Some(-126.0));
    }

    #[test]
    fn test_uint16_wraps() {
        let arr = fresh(TypedArrayKind::Uint16, 1);
        arr.set_f64(0, 65536.0 + 7.0);
        assert_eq!(arr.get(0).unwrap().as_number(), Some(7.0));
    }

    #[test]
    fn test_float32_rounds() {
        let arr = fresh(TypedArrayKind::Float32, 1);
        arr.set_f64(0, 0.1);
        let stored = arr.get(0).unwrap().as_number().unwrap();
        assert_eq!(stored, 0.1_f32 as f64);
    }

    #[test]
    fn test_aliasing_views_little_endian() {
        let buffer = JsArrayBuffer::new(8, None);
        let words = JsTypedArray::new(
            JsObject::alloc(None),
            BufferRef::Plain(buffer.clone()),
            TypedArrayKind::Int32,
            0,
            2,
        )
        .unwrap();
        let bytes = JsTypedArray::new(
            JsObject::alloc(None),
            BufferRef::Plain(buffer),
            TypedArrayKind::Uint8,
            0,
            8,
        )
        .unwrap();

        words.set_f64(0, 0x0102_0304 as f64);
        assert_eq!(bytes.get(0).unwrap().as_number(), Some(0x04 as f64));
        assert_eq!(bytes.get(3).unwrap().as_number(), Some(0x01 as f64));
    }

    #[test]
    fn test_misaligned_offset_rejected() {
        let buffer = JsArrayBuffer::new(8, None);
        let result = JsTypedArray::new(
            JsObject::alloc(None),
            BufferRef::Plain(buffer),
            TypedArrayKind::Int32,
            2,
            1,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_bounds_view_rejected() {
        let buffer = JsArrayBuffer::new(8, None);
        let result = JsTypedArray::new(
            JsObject::alloc(None),
            BufferRef::Plain(buffer),
            TypedArrayKind::Float64,
            0,
            2,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_subarray_shares_buffer() {
        let arr = fresh(TypedArrayKind::Uint8, 4);
        arr.set_f64(2, 9.0);
        let sub = arr.subarray(JsObject::alloc(None), 2, 4).unwrap();
        assert_eq!(sub.length(), 2);
        assert_eq!(sub.get(0).unwrap().as_number(), Some(9.0));
        sub.set_f64(0, 5.0);
        assert_eq!(arr.get(2).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn test_detached_view_reads_nothing() {
        let buffer = JsArrayBuffer::new(4, None);
        let arr = JsTypedArray::new(
            JsObject::alloc(None),
            BufferRef::Plain(buffer.clone()),
            TypedArrayKind::Uint8,
            0,
            4,
        )
        .unwrap();
        buffer.detach();
        assert!(arr.is_detached());
        assert_eq!(arr.length(), 0);
        assert!(arr.get(0).is_none());
        assert!(!arr.set_f64(0, 1.0));
    }

    #[test]
    fn test_bigint_elements() {
        let arr = fresh(TypedArrayKind::BigInt64, 1);
        let neg = JsBigInt::from_i64(-5);
        assert!(arr.set_bigint(0, &neg));
        let read = arr.get(0).unwrap();
        assert_eq!(read.as_bigint().unwrap().value, (-5).into());
    }
}
