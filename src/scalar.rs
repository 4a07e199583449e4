//! Scalar protobuf types and how their values sit on the wire.
//!
//! Every protobuf scalar maps to one Rust type. Where several protobuf types
//! share a Rust representation (`int32`, `sint32`, `sfixed32` are all `i32`)
//! the non-default encodings get a transparent wrapper.

// Casts between same-width signed and unsigned integers are intentional here,
// they are how protobuf defines two's complement varints.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;
use crate::leb128::LebCodec;
use crate::wire::{self, WireType};

/// A protobuf scalar value type.
///
/// Encoding and decoding here covers only the value, never the field key.
pub trait ProtoScalar: Sized + Copy {
    /// The wire type a non-packed value of this type is encoded with.
    const WIRE_TYPE: WireType;
    /// The protobuf name of this type, used in error messages.
    const NAME: &'static str;

    /// Encode the value (without a key) into `buf`.
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B);

    /// The number of bytes [`ProtoScalar::encode_value`] writes.
    fn encoded_value_len(self) -> usize;

    /// Decode a value (without a key) from the front of `buf`.
    ///
    /// Values that don't fit `Self` fail with [`DecodeError::IntegerOverflow`]
    /// rather than being truncated.
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

#[inline]
fn decode_varint_value<B: bytes::Buf>(buf: &mut B) -> Result<u64, DecodeError> {
    u64::decode_leb128_buf(buf).map(|(value, _)| value)
}

impl ProtoScalar for u64 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "uint64";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        self.encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        self.encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        decode_varint_value(buf)
    }
}

impl ProtoScalar for u32 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "uint32";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        self.encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        self.encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        let value = decode_varint_value(buf)?;
        u32::try_from(value).map_err(|_| DecodeError::integer_overflow(value, Self::NAME))
    }
}

impl ProtoScalar for i64 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "int64";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        (self as u64).encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        (self as u64).encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        decode_varint_value(buf).map(|value| value as i64)
    }
}

impl ProtoScalar for i32 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "int32";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        // Negative values are sign-extended to 64 bits.
        (i64::from(self) as u64).encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        (i64::from(self) as u64).encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        // Protobuf int32 is encoded as varint, sign-extended to 64 bits.
        let value = decode_varint_value(buf)?;
        i32::try_from(value as i64).map_err(|_| DecodeError::integer_overflow(value, Self::NAME))
    }
}

impl ProtoScalar for bool {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "bool";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        buf.put_u8(u8::from(self));
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        1
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        decode_varint_value(buf).map(|value| value != 0)
    }
}

/// Wrapper for protobuf `sint32` (zigzag-encoded signed 32-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Sint32(pub i32);

impl ProtoScalar for Sint32 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "sint32";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        wire::zigzag_encode32(self.0).encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        wire::zigzag_encode32(self.0).encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        let value = decode_varint_value(buf)?;
        let zigzag =
            u32::try_from(value).map_err(|_| DecodeError::integer_overflow(value, Self::NAME))?;
        Ok(Sint32(wire::zigzag_decode32(zigzag)))
    }
}

/// Wrapper for protobuf `sint64` (zigzag-encoded signed 64-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Sint64(pub i64);

impl ProtoScalar for Sint64 {
    const WIRE_TYPE: WireType = WireType::Varint;
    const NAME: &'static str = "sint64";

    #[inline]
    fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
        wire::zigzag_encode64(self.0).encode_leb128(buf);
    }

    #[inline]
    fn encoded_value_len(self) -> usize {
        wire::zigzag_encode64(self.0).encoded_leb128_len()
    }

    #[inline]
    fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
        decode_varint_value(buf).map(|value| Sint64(wire::zigzag_decode64(value)))
    }
}

/// Wrapper for protobuf `fixed32` (little-endian unsigned 32-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Fixed32(pub u32);

/// Wrapper for protobuf `fixed64` (little-endian unsigned 64-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Fixed64(pub u64);

/// Wrapper for protobuf `sfixed32` (little-endian signed 32-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Sfixed32(pub i32);

/// Wrapper for protobuf `sfixed64` (little-endian signed 64-bit integer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Sfixed64(pub i64);

macro_rules! impl_fixed_scalar {
    ($($ty:ty, $name:literal, $wire:ident, $width:literal, $put:ident, $get:ident, $wrap:expr, $unwrap:expr;)+) => {$(
        impl ProtoScalar for $ty {
            const WIRE_TYPE: WireType = WireType::$wire;
            const NAME: &'static str = $name;

            #[inline]
            fn encode_value<B: bytes::BufMut>(self, buf: &mut B) {
                buf.$put($unwrap(self));
            }

            #[inline]
            fn encoded_value_len(self) -> usize {
                $width
            }

            #[inline]
            fn decode_value<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
                if buf.remaining() < $width {
                    return Err(DecodeError::unexpected_end_of_buffer());
                }
                Ok($wrap(buf.$get()))
            }
        }
    )+};
}

impl_fixed_scalar! {
    Fixed32, "fixed32", I32, 4, put_u32_le, get_u32_le, Fixed32, |v: Fixed32| v.0;
    Fixed64, "fixed64", I64, 8, put_u64_le, get_u64_le, Fixed64, |v: Fixed64| v.0;
    Sfixed32, "sfixed32", I32, 4, put_i32_le, get_i32_le, Sfixed32, |v: Sfixed32| v.0;
    Sfixed64, "sfixed64", I64, 8, put_i64_le, get_i64_le, Sfixed64, |v: Sfixed64| v.0;
    f32, "float", I32, 4, put_f32_le, get_f32_le, core::convert::identity, core::convert::identity;
    f64, "double", I64, 8, put_f64_le, get_f64_le, core::convert::identity, core::convert::identity;
}

macro_rules! impl_wrapper_conversions {
    ($($wrapper:ident => $inner:ty),+ $(,)?) => {$(
        impl core::ops::Deref for $wrapper {
            type Target = $inner;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$inner> for $wrapper {
            fn from(value: $inner) -> Self {
                $wrapper(value)
            }
        }

        impl From<$wrapper> for $inner {
            fn from(value: $wrapper) -> Self {
                value.0
            }
        }
    )+};
}

impl_wrapper_conversions! {
    Sint32 => i32,
    Sint64 => i64,
    Fixed32 => u32,
    Fixed64 => u64,
    Sfixed32 => i32,
    Sfixed64 => i64,
}
