use alloc::vec::Vec;
use core::fmt;

use crate::wire::WireType;

/// Every way encoding primitives, the [`Decoder`](crate::Decoder) or a selective
/// decode can fail.
///
/// Errors are never retried internally, they surface to the caller who decides
/// whether to abort or substitute a default.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer")]
    UnexpectedEndOfBuffer,
    #[error("invalid leb128 varint")]
    InvalidVarint,
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow {
        value: u64,
        target_type: &'static str,
    },
    #[error("invalid 'wire type' value: {value}")]
    InvalidWireType { value: u8 },
    #[error("invalid field tag: '{reason}'")]
    InvalidFieldTag { reason: InvalidKeyReason },
    #[error(
        "tag mismatch: expected field {expected_tag} ({expected_wire_type}), \
         found field {actual_tag} (wire type {actual_wire_type})"
    )]
    TagMismatch {
        expected_tag: u32,
        expected_wire_type: WireType,
        actual_tag: u64,
        actual_wire_type: u8,
    },
    #[error("invalid tag {tag} in selection at {path}")]
    InvalidTag { tag: i32, path: TagPath },
    #[error("unsupported wire type: {wire_type}")]
    UnsupportedWireType { wire_type: WireType },
    #[error("corrupt packed data: {reason}")]
    PackedDataCorrupt { reason: &'static str },
    #[error("wire type mismatch: expected {expected}, found {actual}")]
    WireTypeMismatch { expected: WireType, actual: WireType },
    #[error("tag not found: {tag}")]
    TagNotFound { tag: i32 },
    #[error("length prefix {value} exceeds platform addressable memory")]
    LengthOverflow { value: u64 },
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}

impl DecodeError {
    #[cold]
    pub(crate) fn unexpected_end_of_buffer() -> Self {
        DecodeError::UnexpectedEndOfBuffer
    }

    #[cold]
    pub(crate) fn invalid_varint() -> Self {
        DecodeError::InvalidVarint
    }

    #[cold]
    pub(crate) fn integer_overflow(value: u64, target_type: &'static str) -> Self {
        DecodeError::IntegerOverflow { value, target_type }
    }

    #[cold]
    pub(crate) fn invalid_wire_type(value: u8) -> Self {
        DecodeError::InvalidWireType { value }
    }

    #[cold]
    pub(crate) fn invalid_field_tag(reason: InvalidKeyReason) -> Self {
        DecodeError::InvalidFieldTag { reason }
    }

    #[cold]
    #[allow(clippy::as_conversions)]
    pub(crate) fn tag_mismatch(
        expected_tag: u32,
        expected_wire_type: WireType,
        actual_raw_key: u64,
    ) -> Self {
        DecodeError::TagMismatch {
            expected_tag,
            expected_wire_type,
            actual_tag: actual_raw_key >> 3,
            actual_wire_type: (actual_raw_key & 0b111) as u8,
        }
    }

    #[cold]
    pub(crate) fn unsupported_wire_type(wire_type: WireType) -> Self {
        DecodeError::UnsupportedWireType { wire_type }
    }

    #[cold]
    pub(crate) fn packed_data_corrupt(reason: &'static str) -> Self {
        DecodeError::PackedDataCorrupt { reason }
    }

    #[cold]
    pub(crate) fn wire_type_mismatch(expected: WireType, actual: WireType) -> Self {
        DecodeError::WireTypeMismatch { expected, actual }
    }

    #[cold]
    pub(crate) fn tag_not_found(tag: i32) -> Self {
        DecodeError::TagNotFound { tag }
    }

    #[cold]
    pub(crate) fn length_overflow(value: u64) -> Self {
        DecodeError::LengthOverflow { value }
    }
}

/// Why a field key could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidKeyReason {
    /// No bytes were left to read a key from.
    EmptyBuffer,
    /// The key varint was malformed or truncated.
    Varint,
    /// The key varint does not fit in 32 bits.
    Overflow,
    /// The field number is zero or above the protobuf maximum.
    TagOutOfRange,
}

impl fmt::Display for InvalidKeyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            InvalidKeyReason::EmptyBuffer => "empty buffer",
            InvalidKeyReason::Varint => "malformed varint",
            InvalidKeyReason::Overflow => "key exceeds 32 bits",
            InvalidKeyReason::TagOutOfRange => "field number out of range",
        };
        f.write_str(reason)
    }
}

/// The chain of nested tags leading to a [`Def`](crate::Def), used to report
/// where an invalid tag was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagPath(pub Vec<i32>);

impl fmt::Display for TagPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, tag) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{tag}")?;
        }
        f.write_str("]")
    }
}
