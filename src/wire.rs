//! Wire format for Google's Protocol Buffers, aka [protobuf](https://protobuf.dev).
//!
//! Pure, stateless primitives: varints, zigzag, fixed-width values and field
//! keys. Everything here follows <https://protobuf.dev/programming-guides/encoding>.

use core::fmt;
use core::num::NonZeroU32;

use crate::error::{DecodeError, InvalidKeyReason};
use crate::leb128::LebCodec;
use crate::util::{likely, unlikely};

/// Minimum value of a protobuf tag.
pub const MINIMUM_TAG_VAL: u32 = 1;
/// Maximum value of a protobuf tag.
pub const MAXIMUM_TAG_VAL: u32 = (1 << 29) - 1;
/// Field numbers reserved for the protobuf implementation itself.
pub const RESERVED_TAG_RANGE: core::ops::RangeInclusive<u32> = 19_000..=19_999;

/// Returns whether `tag` may be declared as a field number in a schema.
///
/// Decoding accepts any tag in `MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL`, the
/// reserved range only matters when declaring fields.
#[inline]
pub fn is_valid_field_number(tag: u32) -> bool {
    (MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL).contains(&tag) && !RESERVED_TAG_RANGE.contains(&tag)
}

/// Denotes the type of a field in an encoded protobuf message.
///
/// Protobuf messages are a series of key-value pairs. When encoded each key-value pair
/// is turned into a record consisting of a field number, a [`WireType`], and a payload.
/// The [`WireType`] indicates how large the proceeding payload is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable length integer.
    ///
    /// Used for: `int32`, `int64`, `uint32`, `uint64`, `sint32`, `sint64`, `bool`, `enum`.
    Varint = 0,
    /// 64-bit integer.
    ///
    /// Used for: `fixed64`, `sfixed64`, `double`.
    I64 = 1,
    /// Variable length field.
    ///
    /// Used for: `string`, `bytes`, `message`, packed `repeated` fields.
    Len = 2,
    /// Group start (deprecated, recognized but never decoded).
    SGroup = 3,
    /// Group end (deprecated, recognized but never decoded).
    EGroup = 4,
    /// 32-bit integer.
    ///
    /// Used for: `fixed32`, `sfixed32`, `float`.
    I32 = 5,
}

// N.B. It's not super important that these are the same size, but keeping them as such
// allows the compiler to make as many optimizations as possible.
static_assertions::assert_eq_size!(WireType, Result<WireType, ()>);

#[allow(clippy::as_conversions)]
impl WireType {
    /// Maximum value an [`WireType`] can be.
    const MAX_VAL: u8 = WireType::I32 as u8;

    /// Try to decode a [`WireType`] from the provided raw value.
    #[inline(always)]
    fn try_from_val(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::SGroup),
            4 => Ok(WireType::EGroup),
            5 => Ok(WireType::I32),
            other => Err(DecodeError::invalid_wire_type(other)),
        }
    }

    /// Return the raw value for this [`WireType`].
    #[inline(always)]
    pub const fn into_val(self) -> u8 {
        self as u8
    }

    /// Number of payload bytes for the fixed-width wire types.
    #[inline]
    pub const fn fixed_len(self) -> Option<usize> {
        match self {
            WireType::I32 => Some(4),
            WireType::I64 => Some(8),
            _ => None,
        }
    }
}

impl TryFrom<u8> for WireType {
    type Error = DecodeError;

    #[inline(always)]
    fn try_from(value: u8) -> Result<Self, DecodeError> {
        WireType::try_from_val(value)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::I64 => "fixed64",
            WireType::Len => "length-delimited",
            WireType::SGroup => "group start",
            WireType::EGroup => "group end",
            WireType::I32 => "fixed32",
        };
        f.write_str(name)
    }
}

/// A decoded protobuf field key containing a wire type and tag.
///
/// The layout mirrors the protobuf wire format:
/// * Bits 0-2: wire type (0-5)
/// * Bits 3-31: tag/field number (1 to 2^29-1)
///
/// Since tags start at 1, the minimum raw value is 8 (`1 << 3`), guaranteeing
/// the value is always non-zero and `Option<ProtoKey>` is free.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ProtoKey(NonZeroU32);

#[allow(clippy::as_conversions)]
impl ProtoKey {
    /// Creates a new [`ProtoKey`] from a raw key value, validating the wire type and tag.
    #[inline(always)]
    fn try_from_raw(raw_key: u32) -> Result<Self, DecodeError> {
        let wire_type_raw = (raw_key & 0b111) as u8;
        if unlikely(wire_type_raw > WireType::MAX_VAL) {
            return Err(DecodeError::invalid_wire_type(wire_type_raw));
        }

        let tag = raw_key >> 3;
        if unlikely(tag < MINIMUM_TAG_VAL) {
            return Err(DecodeError::invalid_field_tag(
                InvalidKeyReason::TagOutOfRange,
            ));
        }

        NonZeroU32::new(raw_key)
            .map(ProtoKey)
            .ok_or_else(|| DecodeError::invalid_field_tag(InvalidKeyReason::TagOutOfRange))
    }

    /// Creates a key from its parts, returns `None` if `tag` is out of range.
    #[inline]
    pub fn new(tag: u32, wire_type: WireType) -> Option<Self> {
        if !(MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL).contains(&tag) {
            return None;
        }
        NonZeroU32::new((tag << 3) | u32::from(wire_type.into_val())).map(ProtoKey)
    }

    /// Returns the [`WireType`] component of this key.
    #[inline(always)]
    pub fn wire_type(self) -> WireType {
        match self.0.get() & 0b111 {
            0 => WireType::Varint,
            1 => WireType::I64,
            2 => WireType::Len,
            3 => WireType::SGroup,
            4 => WireType::EGroup,
            // Validated during construction, 6 and 7 never make it here.
            _ => WireType::I32,
        }
    }

    /// Returns the tag/field number component of this key.
    #[inline(always)]
    pub const fn tag(self) -> u32 {
        self.0.get() >> 3
    }

    /// Returns the raw `(tag << 3) | wire_type` value.
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0.get()
    }

    /// Decomposes this key into its tag and [`WireType`] components.
    #[inline(always)]
    pub fn into_parts(self) -> (u32, WireType) {
        (self.tag(), self.wire_type())
    }
}

impl fmt::Debug for ProtoKey {
    #[cold]
    #[inline(never)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtoKey")
            .field("tag", &self.tag())
            .field("wire_type", &self.wire_type())
            .finish()
    }
}

/// Encodes `value` as a varint, returning the number of bytes written.
#[inline]
pub fn encode_varint<B: bytes::BufMut>(value: u64, buf: &mut B) -> usize {
    value.encode_leb128(buf)
}

/// Decodes a varint from the front of `data`, returning the value and the
/// number of bytes it occupied.
#[inline]
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), DecodeError> {
    u64::decode_leb128(data)
}

/// Maps a signed 32-bit integer onto an unsigned one so small magnitudes stay short.
#[inline]
#[allow(clippy::as_conversions)]
pub const fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
#[inline]
#[allow(clippy::as_conversions)]
pub const fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ (-((n & 1) as i32))
}

/// Maps a signed 64-bit integer onto an unsigned one so small magnitudes stay short.
#[inline]
#[allow(clippy::as_conversions)]
pub const fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
#[inline]
#[allow(clippy::as_conversions)]
pub const fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

/// Writes `value` as 4 little-endian bytes.
#[inline]
pub fn encode_fixed32<B: bytes::BufMut>(value: u32, buf: &mut B) {
    buf.put_u32_le(value);
}

/// Writes `value` as 8 little-endian bytes.
#[inline]
pub fn encode_fixed64<B: bytes::BufMut>(value: u64, buf: &mut B) {
    buf.put_u64_le(value);
}

/// Reads 4 little-endian bytes from the front of `data`.
#[inline]
pub fn decode_fixed32(data: &[u8]) -> Result<u32, DecodeError> {
    data.get(..4)
        .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
        .map(u32::from_le_bytes)
        .ok_or_else(DecodeError::unexpected_end_of_buffer)
}

/// Reads 8 little-endian bytes from the front of `data`.
#[inline]
pub fn decode_fixed64(data: &[u8]) -> Result<u64, DecodeError> {
    data.get(..8)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_le_bytes)
        .ok_or_else(DecodeError::unexpected_end_of_buffer)
}

/// Encodes the provided tag and wire type as a protobuf field key, returning
/// the number of bytes written.
///
/// Hot path for encoding - called for every field in every message.
#[inline(always)]
pub fn encode_tag<B: bytes::BufMut>(tag: u32, wire_type: WireType, buf: &mut B) -> usize {
    let key = (u64::from(tag) << 3) | u64::from(wire_type.into_val());
    key.encode_leb128(buf)
}

/// Decodes a field key from the front of `data`, returning the tag, the
/// [`WireType`] and the number of bytes the key occupied.
#[inline]
pub fn decode_tag(data: &[u8]) -> Result<(u32, WireType, usize), DecodeError> {
    let mut cursor = data;
    let key = decode_key(&mut cursor)?;
    let (tag, wire_type) = key.into_parts();
    Ok((tag, wire_type, data.len() - cursor.len()))
}

/// Decodes the key from a protobuf encoded message.
///
/// # Performance
///
/// This is one of the hottest functions in the decode path - it's called for
/// every field in every message, so single byte keys take a dedicated branch.
#[inline]
pub fn decode_key<B: bytes::Buf>(buf: &mut B) -> Result<ProtoKey, DecodeError> {
    let chunk = buf.chunk();

    // N.B. Keys always fit in u32, the max tag value is `2^29-1` and thus the
    // max key value is `(2^29-1) << 3 | 7` which is `u32::MAX`.
    let value = if unlikely(chunk.is_empty()) {
        return Err(DecodeError::invalid_field_tag(
            InvalidKeyReason::EmptyBuffer,
        ));
    } else if likely(chunk[0] < 0x80) {
        let value = u32::from(chunk[0]);
        buf.advance(1);
        value
    } else {
        let (value, _) = u64::decode_leb128_buf(buf)
            .map_err(|_| DecodeError::invalid_field_tag(InvalidKeyReason::Varint))?;
        u32::try_from(value)
            .map_err(|_| DecodeError::invalid_field_tag(InvalidKeyReason::Overflow))?
    };

    ProtoKey::try_from_raw(value)
}

/// Decodes the length prefix for a length-delimited field.
///
/// The length is only checked against what the platform can address, callers
/// must still check it against the bytes that remain.
#[inline(always)]
pub fn decode_len<B: bytes::Buf>(buf: &mut B) -> Result<usize, DecodeError> {
    let chunk = buf.chunk();
    // Fast path, most lengths fit in one byte (< 128).
    if likely(!chunk.is_empty() && chunk[0] < 0x80) {
        let len = usize::from(chunk[0]);
        buf.advance(1);
        Ok(len)
    } else {
        let (len, _) = u64::decode_leb128_buf(buf)?;
        usize::try_from(len).map_err(|_| DecodeError::length_overflow(len))
    }
}

/// Skips over a field value based on its wire type.
///
/// Protobuf supports backwards and forwards compatibility by skipping fields
/// we don't know about. We "skip" a field by advancing our buffer past it.
#[inline(always)]
pub fn skip_field<B: bytes::Buf>(wire_type: WireType, buf: &mut B) -> Result<(), DecodeError> {
    let skip_len = match wire_type {
        WireType::Varint => {
            u64::decode_leb128_buf(buf)?;
            return Ok(());
        }
        WireType::I64 => 8,
        WireType::Len => decode_len(buf)?,
        WireType::I32 => 4,
        WireType::SGroup | WireType::EGroup => {
            return Err(DecodeError::unsupported_wire_type(wire_type));
        }
    };

    // N.B. Comparing against `remaining` instead of adding to an offset means
    // an absurd length can never wrap around.
    if buf.remaining() < skip_len {
        return Err(DecodeError::unexpected_end_of_buffer());
    }
    buf.advance(skip_len);
    Ok(())
}

#[cfg(test)]
mod test {
    use alloc::vec::Vec;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn proptest_key_roundtrips() {
        fn arb_tag() -> impl Strategy<Value = u32> {
            MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL
        }

        fn arb_wiretype() -> impl Strategy<Value = WireType> {
            prop_oneof![
                Just(WireType::Varint),
                Just(WireType::I64),
                Just(WireType::Len),
                Just(WireType::I32),
            ]
        }

        fn test(tag: u32, wire_type: WireType) {
            let mut buf = Vec::with_capacity(16);
            let written = encode_tag(tag, wire_type, &mut buf);
            let (rnd_tag, rnd_wire_type, read) = decode_tag(&buf).unwrap();

            assert_eq!(tag, rnd_tag);
            assert_eq!(wire_type, rnd_wire_type);
            assert_eq!(written, read);
        }

        let strat = (arb_tag(), arb_wiretype());
        proptest!(|((tag, wire_type) in strat)| test(tag, wire_type))
    }

    #[test]
    fn test_all_valid_values() {
        for i in u8::MIN..u8::MAX {
            let wire_type = WireType::try_from_val(i);
            match (i, wire_type) {
                (0, Ok(WireType::Varint))
                | (1, Ok(WireType::I64))
                | (2, Ok(WireType::Len))
                | (3, Ok(WireType::SGroup))
                | (4, Ok(WireType::EGroup))
                | (5, Ok(WireType::I32)) => (),
                (_, Err(DecodeError::InvalidWireType { value })) => assert_eq!(value, i),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn test_field_number_validity() {
        assert!(!is_valid_field_number(0));
        assert!(is_valid_field_number(1));
        assert!(is_valid_field_number(18_999));
        assert!(!is_valid_field_number(19_000));
        assert!(!is_valid_field_number(19_999));
        assert!(is_valid_field_number(20_000));
        assert!(is_valid_field_number(MAXIMUM_TAG_VAL));
        assert!(!is_valid_field_number(MAXIMUM_TAG_VAL + 1));
    }

    #[test]
    fn test_known_keys() {
        let mut buf = Vec::new();
        encode_tag(1, WireType::Varint, &mut buf);
        encode_tag(2, WireType::Len, &mut buf);
        assert_eq!(buf, [0x08, 0x12]);
    }

    #[test]
    fn test_decode_key_errors() {
        assert_eq!(
            decode_key(&mut &[0u8; 0][..]),
            Err(DecodeError::InvalidFieldTag {
                reason: InvalidKeyReason::EmptyBuffer
            })
        );
        // Field number zero.
        assert_eq!(
            decode_key(&mut &[0x00][..]),
            Err(DecodeError::InvalidFieldTag {
                reason: InvalidKeyReason::TagOutOfRange
            })
        );
        // Wire type 7.
        assert_eq!(
            decode_key(&mut &[0x0f][..]),
            Err(DecodeError::InvalidWireType { value: 7 })
        );
        // Truncated varint.
        assert_eq!(
            decode_key(&mut &[0x80][..]),
            Err(DecodeError::InvalidFieldTag {
                reason: InvalidKeyReason::Varint
            })
        );
        // Larger than 32 bits.
        assert_eq!(
            decode_key(&mut &[0x80, 0x80, 0x80, 0x80, 0x80, 0x01][..]),
            Err(DecodeError::InvalidFieldTag {
                reason: InvalidKeyReason::Overflow
            })
        );
    }

    #[test]
    fn test_zigzag_encoding() {
        // Reference values from the protobuf encoding guide.
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode32(-2), 3);
        assert_eq!(zigzag_encode32(i32::MAX), 4294967294);
        assert_eq!(zigzag_encode32(i32::MIN), 4294967295);

        assert_eq!(zigzag_encode64(-1), 1);
        assert_eq!(zigzag_encode64(1), 2);
        assert_eq!(zigzag_encode64(i64::MIN), u64::MAX);

        for v in [0, 1, -1, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode32(zigzag_encode32(v)), v);
            assert_eq!(zigzag_decode64(zigzag_encode64(i64::from(v))), i64::from(v));
        }
        for v in [i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode64(zigzag_encode64(v)), v);
        }
    }

    #[test]
    fn test_fixed_layout() {
        let mut buf = Vec::new();
        encode_fixed32(0x0403_0201, &mut buf);
        encode_fixed64(0x0807_0605_0403_0201, &mut buf);
        assert_eq!(buf, [1, 2, 3, 4, 1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(decode_fixed32(&buf).unwrap(), 0x0403_0201);
        assert_eq!(decode_fixed64(&buf[4..]).unwrap(), 0x0807_0605_0403_0201);
        assert_eq!(
            decode_fixed64(&buf[5..]),
            Err(DecodeError::UnexpectedEndOfBuffer)
        );
    }

    #[test]
    fn test_decode_len() {
        let mut buf = &[0u8][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 0);

        let mut buf = &[127u8][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 127);

        let mut buf = &[0x80, 0x01][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 128);

        let mut buf = &[0xAC, 0x02][..];
        assert_eq!(decode_len(&mut buf).unwrap(), 300);
    }

    #[test]
    fn test_skip_field_varint() {
        let mut buf = &[42u8, 99][..];
        skip_field(WireType::Varint, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[0x80, 0x01, 99][..];
        skip_field(WireType::Varint, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_field_fixed() {
        let mut buf = &[1, 2, 3, 4, 99][..];
        skip_field(WireType::I32, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[1, 2, 3, 4, 5, 6, 7, 8, 99][..];
        skip_field(WireType::I64, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_field_len() {
        let mut buf = &[3, 1, 2, 3, 99][..];
        skip_field(WireType::Len, &mut buf).unwrap();
        assert_eq!(buf, &[99]);

        let mut buf = &[0, 99][..];
        skip_field(WireType::Len, &mut buf).unwrap();
        assert_eq!(buf, &[99]);
    }

    #[test]
    fn test_skip_field_huge_length() {
        // A length of u64::MAX must be rejected, never wrap.
        let mut buf = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01, 0x00][..];
        assert!(skip_field(WireType::Len, &mut buf).is_err());
    }

    #[test]
    fn test_skip_field_groups_error() {
        let mut buf = &[0u8][..];
        assert_eq!(
            skip_field(WireType::SGroup, &mut buf),
            Err(DecodeError::UnsupportedWireType {
                wire_type: WireType::SGroup
            })
        );
        assert!(skip_field(WireType::EGroup, &mut buf).is_err());
    }
}
