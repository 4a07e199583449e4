//! Typed access to the raw occurrences captured for one tag.

use alloc::vec::Vec;
use core::fmt;

use super::{MessageView, Occurrence, Tree};
use crate::error::DecodeError;
use crate::packed;
use crate::scalar::{Fixed32, Fixed64, ProtoScalar, Sfixed32, Sfixed64, Sint32, Sint64};
use crate::wire::WireType;

/// Every occurrence of one field captured by a selective decode.
///
/// Nothing is interpreted until an accessor asks for it. Scalar accessors
/// (`*_value`) read the **last** occurrence, the same value a full decode of a
/// non-repeated field would keep. Repeated accessors (`*_values`) read every
/// occurrence in order and transparently unpack packed runs, so one stored
/// occurrence can yield many values.
///
/// Accessors fail with [`DecodeError::TagNotFound`] when nothing was captured
/// for the tag and with [`DecodeError::WireTypeMismatch`] when the stored wire
/// type doesn't fit the requested type.
#[derive(Clone, Copy)]
pub struct FieldData<'r> {
    tag: i32,
    occurrences: &'r [Occurrence],
    tree: &'r Tree,
    source: &'r [u8],
}

impl<'r> FieldData<'r> {
    pub(super) fn new(
        tag: i32,
        occurrences: &'r [Occurrence],
        tree: &'r Tree,
        source: &'r [u8],
    ) -> Self {
        FieldData {
            tag,
            occurrences,
            tree,
            source,
        }
    }

    /// The tag this data was captured under, negative for raw captures.
    #[inline]
    pub fn tag(&self) -> i32 {
        self.tag
    }

    /// Number of occurrences captured.
    #[inline]
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// Wire type of the last occurrence.
    pub fn wire_type(&self) -> Result<WireType, DecodeError> {
        self.last().map(|occurrence| occurrence.wire_type)
    }

    /// The wire type and value bytes (no key, no length prefix) of every
    /// occurrence, in the order they appeared.
    pub fn raw_values(&self) -> impl Iterator<Item = (WireType, &'r [u8])> + 'r {
        let source = self.source;
        self.occurrences
            .iter()
            .map(move |occurrence| (occurrence.wire_type, &source[occurrence.span.range()]))
    }

    #[inline]
    fn last(&self) -> Result<&'r Occurrence, DecodeError> {
        self.occurrences
            .last()
            .ok_or_else(|| DecodeError::tag_not_found(self.tag))
    }

    #[inline]
    fn bytes_of(&self, occurrence: &Occurrence) -> &'r [u8] {
        &self.source[occurrence.span.range()]
    }

    #[inline]
    fn expect_non_empty(&self) -> Result<(), DecodeError> {
        self.last().map(|_| ())
    }

    /// Decode the last occurrence as `T`.
    pub fn scalar<T: ProtoScalar>(&self) -> Result<T, DecodeError> {
        let last = self.last()?;
        if last.wire_type != T::WIRE_TYPE {
            return Err(DecodeError::wire_type_mismatch(T::WIRE_TYPE, last.wire_type));
        }
        T::decode_value(&mut self.bytes_of(last))
    }

    /// Decode every occurrence as `T`, unpacking length-delimited ones.
    pub fn scalars<T: ProtoScalar>(&self) -> Result<Vec<T>, DecodeError> {
        self.expect_non_empty()?;
        let mut values = Vec::with_capacity(self.occurrences.len());
        for occurrence in self.occurrences {
            let mut bytes = self.bytes_of(occurrence);
            if occurrence.wire_type == T::WIRE_TYPE {
                values.push(T::decode_value(&mut bytes)?);
            } else if occurrence.wire_type == WireType::Len {
                packed::decode_packed_into(bytes, &mut values)?;
            } else {
                return Err(DecodeError::wire_type_mismatch(
                    T::WIRE_TYPE,
                    occurrence.wire_type,
                ));
            }
        }
        Ok(values)
    }

    fn len_delimited(&self, occurrence: &Occurrence) -> Result<&'r [u8], DecodeError> {
        match occurrence.wire_type {
            WireType::Len => Ok(self.bytes_of(occurrence)),
            actual => Err(DecodeError::wire_type_mismatch(WireType::Len, actual)),
        }
    }

    /// The payload of the last occurrence.
    ///
    /// Also works for a field decoded as a sub-message, returning its encoding.
    pub fn bytes_value(&self) -> Result<&'r [u8], DecodeError> {
        self.len_delimited(self.last()?)
    }

    pub fn bytes_values(&self) -> Result<Vec<&'r [u8]>, DecodeError> {
        self.expect_non_empty()?;
        self.occurrences
            .iter()
            .map(|occurrence| self.len_delimited(occurrence))
            .collect()
    }

    /// The last occurrence as UTF-8 text.
    pub fn string_value(&self) -> Result<&'r str, DecodeError> {
        let bytes = self.bytes_value()?;
        core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn string_values(&self) -> Result<Vec<&'r str>, DecodeError> {
        self.expect_non_empty()?;
        self.occurrences
            .iter()
            .map(|occurrence| {
                let bytes = self.len_delimited(occurrence)?;
                core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
            })
            .collect()
    }

    fn view_of(&self, occurrence: &Occurrence) -> Result<MessageView<'r>, DecodeError> {
        self.len_delimited(occurrence)?;
        match occurrence.nested {
            Some(node) => Ok(MessageView::new(self.tree, self.source, node)),
            // Captured as raw bytes only, there's no decoded structure to view.
            None => Err(DecodeError::tag_not_found(self.tag)),
        }
    }

    /// The decoded sub-message of the last occurrence.
    pub fn message(&self) -> Result<MessageView<'r>, DecodeError> {
        self.view_of(self.last()?)
    }

    /// Every decoded sub-message, for repeated message fields.
    pub fn messages(&self) -> Result<Vec<MessageView<'r>>, DecodeError> {
        self.expect_non_empty()?;
        self.occurrences
            .iter()
            .map(|occurrence| self.view_of(occurrence))
            .collect()
    }
}

macro_rules! field_accessors {
    ($($(#[$meta:meta])* $value:ident, $values:ident -> $ty:ty as $proto:ty;)+) => {$(
        $(#[$meta])*
        #[inline]
        pub fn $value(&self) -> Result<$ty, DecodeError> {
            self.scalar::<$proto>().map(<$ty>::from)
        }

        $(#[$meta])*
        pub fn $values(&self) -> Result<Vec<$ty>, DecodeError> {
            self.scalars::<$proto>()
                .map(|values| values.into_iter().map(<$ty>::from).collect())
        }
    )+};
}

impl FieldData<'_> {
    field_accessors! {
        /// Any non-zero varint is `true`.
        bool_value, bool_values -> bool as bool;
        int32_value, int32_values -> i32 as i32;
        int64_value, int64_values -> i64 as i64;
        uint32_value, uint32_values -> u32 as u32;
        uint64_value, uint64_values -> u64 as u64;
        sint32_value, sint32_values -> i32 as Sint32;
        sint64_value, sint64_values -> i64 as Sint64;
        fixed32_value, fixed32_values -> u32 as Fixed32;
        fixed64_value, fixed64_values -> u64 as Fixed64;
        sfixed32_value, sfixed32_values -> i32 as Sfixed32;
        sfixed64_value, sfixed64_values -> i64 as Sfixed64;
        float_value, float_values -> f32 as f32;
        double_value, double_values -> f64 as f64;
        /// Enum values are returned as raw numbers, unknown ones included.
        enum_value, enum_values -> i32 as i32;
    }
}

impl fmt::Debug for FieldData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldData")
            .field("tag", &self.tag)
            .field("occurrences", &self.occurrences.len())
            .field("wire_type", &self.occurrences.last().map(|o| o.wire_type))
            .finish()
    }
}
