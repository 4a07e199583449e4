//! Sequential field encoding into a caller-sized buffer.
//!
//! The [`Encoder`] never grows its buffer. Callers size it up front with the
//! helpers in [`crate::size`] (or [`MessageEncode::encoded_len`]) and the
//! encoder writes into exactly that space. Writing past the end is a bug in
//! the caller's size calculation and panics.

#![allow(clippy::as_conversions)]

use bytes::BufMut;

use crate::message::MessageEncode;
use crate::scalar::{Fixed32, Fixed64, ProtoScalar, Sfixed32, Sfixed64, Sint32, Sint64};
use crate::wire::{self, WireType};

/// Appends encoded fields to a borrowed, presized output buffer.
///
/// ```
/// use protopick::Encoder;
///
/// let mut buf = [0u8; 8];
/// let mut enc = Encoder::new(&mut buf);
/// enc.encode_bool(1, true);
/// enc.encode_string(2, "test");
/// assert_eq!(enc.written(), b"\x08\x01\x12\x04test");
/// ```
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> Encoder<'a> {
    /// Create an encoder that writes from the start of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Encoder { buf, offset: 0 }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes that can still be written.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// The bytes written so far.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.offset]
    }

    /// Consume the encoder, returning the written prefix of the buffer.
    pub fn into_written(self) -> &'a mut [u8] {
        let Encoder { buf, offset } = self;
        &mut buf[..offset]
    }

    /// Runs `f` against the unwritten tail and advances past whatever it wrote.
    #[inline(always)]
    fn put<F: FnOnce(&mut &mut [u8])>(&mut self, f: F) {
        let mut tail = &mut self.buf[self.offset..];
        let before = tail.len();
        f(&mut tail);
        let written = before - tail.len();
        self.offset += written;
    }

    #[inline]
    fn put_key(&mut self, tag: u32, wire_type: WireType) {
        self.put(|tail| {
            wire::encode_tag(tag, wire_type, tail);
        });
    }

    #[inline]
    fn put_len(&mut self, len: usize) {
        self.put(|tail| {
            wire::encode_varint(len as u64, tail);
        });
    }

    /// Write a complete scalar field: key then value.
    #[inline]
    pub fn encode_scalar<T: ProtoScalar>(&mut self, tag: u32, value: T) {
        self.put_key(tag, T::WIRE_TYPE);
        self.put(|tail| value.encode_value(tail));
    }

    /// Write a complete `bytes` field: key, length prefix and payload.
    #[inline]
    pub fn encode_bytes(&mut self, tag: u32, value: &[u8]) {
        self.put_key(tag, WireType::Len);
        self.put_len(value.len());
        self.put(|tail| tail.put_slice(value));
    }

    /// Write a complete `string` field.
    #[inline]
    pub fn encode_string(&mut self, tag: u32, value: &str) {
        self.encode_bytes(tag, value.as_bytes());
    }

    /// Write a packed repeated field.
    ///
    /// An empty slice still writes the key and a zero length.
    pub fn encode_packed<T: ProtoScalar>(&mut self, tag: u32, values: &[T]) {
        self.put_packed::<T, T>(tag, values);
    }

    fn put_packed<T: ProtoScalar, V: Copy + Into<T>>(&mut self, tag: u32, values: &[V]) {
        let payload_len = match T::WIRE_TYPE.fixed_len() {
            Some(width) => width * values.len(),
            None => values
                .iter()
                .map(|v| Into::<T>::into(*v).encoded_value_len())
                .sum(),
        };
        self.put_key(tag, WireType::Len);
        self.put_len(payload_len);
        self.put(|tail| {
            for value in values {
                Into::<T>::into(*value).encode_value(tail);
            }
        });
    }

    /// Write a nested message as a length-delimited field.
    pub fn encode_nested<M: MessageEncode + ?Sized>(&mut self, tag: u32, message: &M) {
        let len = message.encoded_len();
        self.put_key(tag, WireType::Len);
        self.put_len(len);

        let start = self.offset;
        message.encode_to(self);
        debug_assert_eq!(
            self.offset - start,
            len,
            "encoded_len disagrees with the bytes encode_to wrote"
        );
    }

    /// Append already-encoded bytes verbatim, e.g. preserved unknown fields.
    #[inline]
    pub fn encode_raw(&mut self, raw: &[u8]) {
        self.put(|tail| tail.put_slice(raw));
    }
}

macro_rules! encode_scalars {
    ($($(#[$meta:meta])* $name:ident($ty:ty) as $proto:ty;)+) => {$(
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self, tag: u32, value: $ty) {
            self.encode_scalar(tag, <$proto>::from(value));
        }
    )+};
}

macro_rules! encode_packed_scalars {
    ($($name:ident($ty:ty) as $proto:ty;)+) => {$(
        #[inline]
        pub fn $name(&mut self, tag: u32, values: &[$ty]) {
            self.put_packed::<$proto, $ty>(tag, values);
        }
    )+};
}

impl Encoder<'_> {
    encode_scalars! {
        encode_bool(bool) as bool;
        /// Negative values take ten bytes, they are sign-extended to 64 bits.
        encode_int32(i32) as i32;
        encode_int64(i64) as i64;
        encode_uint32(u32) as u32;
        encode_uint64(u64) as u64;
        encode_sint32(i32) as Sint32;
        encode_sint64(i64) as Sint64;
        encode_fixed32(u32) as Fixed32;
        encode_fixed64(u64) as Fixed64;
        encode_sfixed32(i32) as Sfixed32;
        encode_sfixed64(i64) as Sfixed64;
        encode_float(f32) as f32;
        encode_double(f64) as f64;
        /// Enums are encoded exactly like `int32`.
        encode_enum(i32) as i32;
    }

    encode_packed_scalars! {
        encode_packed_bool(bool) as bool;
        encode_packed_int32(i32) as i32;
        encode_packed_int64(i64) as i64;
        encode_packed_uint32(u32) as u32;
        encode_packed_uint64(u64) as u64;
        encode_packed_sint32(i32) as Sint32;
        encode_packed_sint64(i64) as Sint64;
        encode_packed_fixed32(u32) as Fixed32;
        encode_packed_fixed64(u64) as Fixed64;
        encode_packed_sfixed32(i32) as Sfixed32;
        encode_packed_sfixed64(i64) as Sfixed64;
        encode_packed_float(f32) as f32;
        encode_packed_double(f64) as f64;
        encode_packed_enum(i32) as i32;
    }
}
