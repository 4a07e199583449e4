//! Exact encoded sizes.
//!
//! An [`Encoder`](crate::Encoder) never grows its buffer, callers compute the
//! total with these helpers first and allocate exactly that much. Each helper
//! agrees byte-for-byte with the matching `encode_*` operation.

#![allow(clippy::as_conversions)]

use crate::leb128::LebCodec;
use crate::message::MessageEncode;
use crate::packed;
use crate::scalar::ProtoScalar;
use crate::wire;

/// Size of `value` encoded as a varint.
#[inline]
pub fn size_of_varint(value: u64) -> usize {
    value.encoded_leb128_len()
}

/// Size of the field key for `tag`, the wire type never affects it.
#[inline]
pub fn size_of_tag(tag: u32) -> usize {
    size_of_varint(u64::from(tag) << 3)
}

/// Size of `value` encoded as a zigzag `sint32`.
#[inline]
pub fn size_of_zigzag32(value: i32) -> usize {
    wire::zigzag_encode32(value).encoded_leb128_len()
}

/// Size of `value` encoded as a zigzag `sint64`.
#[inline]
pub fn size_of_zigzag64(value: i64) -> usize {
    wire::zigzag_encode64(value).encoded_leb128_len()
}

/// Size of a length prefix plus `len` payload bytes.
#[inline]
pub fn size_of_bytes(len: usize) -> usize {
    size_of_varint(len as u64) + len
}

/// Size of a complete scalar field: key plus value.
#[inline]
pub fn size_of_field<T: ProtoScalar>(tag: u32, value: T) -> usize {
    size_of_tag(tag) + value.encoded_value_len()
}

/// Size of a complete `bytes`/`string` field holding `len` bytes.
#[inline]
pub fn size_of_bytes_field(tag: u32, len: usize) -> usize {
    size_of_tag(tag) + size_of_bytes(len)
}

/// Size of a complete packed field: key, length prefix and values.
#[inline]
pub fn size_of_packed_field<T: ProtoScalar>(tag: u32, values: &[T]) -> usize {
    size_of_tag(tag) + size_of_bytes(packed::packed_payload_len(values))
}

/// Size of a complete nested message field: key, length prefix and body.
#[inline]
pub fn size_of_nested_field<M: MessageEncode + ?Sized>(tag: u32, message: &M) -> usize {
    size_of_tag(tag) + size_of_bytes(message.encoded_len())
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use proptest::prelude::*;
    use proptest::property_test;

    use super::*;
    use crate::wire::{encode_tag, WireType, MAXIMUM_TAG_VAL};

    #[test]
    fn test_tag_sizes() {
        assert_eq!(size_of_tag(1), 1);
        assert_eq!(size_of_tag(15), 1);
        assert_eq!(size_of_tag(16), 2);
        assert_eq!(size_of_tag(2047), 2);
        assert_eq!(size_of_tag(2048), 3);
        assert_eq!(size_of_tag(MAXIMUM_TAG_VAL), 5);
    }

    #[test]
    fn test_zigzag_sizes() {
        assert_eq!(size_of_zigzag32(0), 1);
        assert_eq!(size_of_zigzag32(-1), 1);
        assert_eq!(size_of_zigzag32(-64), 1);
        assert_eq!(size_of_zigzag32(64), 2);
        assert_eq!(size_of_zigzag32(i32::MIN), 5);
        assert_eq!(size_of_zigzag64(i64::MIN), 10);
    }

    #[test]
    fn test_bytes_sizes() {
        assert_eq!(size_of_bytes(0), 1);
        assert_eq!(size_of_bytes(127), 128);
        assert_eq!(size_of_bytes(128), 130);
        assert_eq!(size_of_bytes_field(2, 4), 6);
    }

    #[test]
    fn proptest_tag_size_matches_encoding() {
        proptest!(|(tag in 1u32..=MAXIMUM_TAG_VAL)| {
            let mut buf = Vec::new();
            let written = encode_tag(tag, WireType::I32, &mut buf);
            prop_assert_eq!(written, size_of_tag(tag));
            prop_assert_eq!(buf.len(), size_of_tag(tag));
        });
    }

    #[property_test]
    fn proptest_varint_size_matches_encoding(value: u64) {
        let mut buf = Vec::new();
        wire::encode_varint(value, &mut buf);
        prop_assert_eq!(buf.len(), size_of_varint(value));
    }
}
