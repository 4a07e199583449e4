//! Sequential field decoding from a borrowed input buffer.
//!
//! A [`Decoder`] is a read cursor over `&'a [u8]`. Every operation either
//! advances the cursor by exactly the bytes it consumed or fails and leaves it
//! where it was, so a caller can inspect the failure point or substitute a
//! default and carry on.
//!
//! # Modes
//!
//! [`Mode::Safe`] copies every `bytes`/`string` value into owned memory and
//! re-validates the key preceding each [`Decoder::skip`]. [`Mode::Fast`] hands
//! back views that alias the input and trusts the caller's keys. The aliasing
//! is expressed through the `'a` lifetime, so the borrow checker refuses any
//! use of a fast-mode view after the input buffer is gone.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::DecodeError;
use crate::message::MessageDecode;
use crate::packed;
use crate::scalar::{Fixed32, Fixed64, ProtoScalar, Sfixed32, Sfixed64, Sint32, Sint64};
use crate::size;
use crate::wire::{self, WireType};

/// How a [`Decoder`] trades copying for throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Copy `bytes`/`string` values and validate keys on skip.
    #[default]
    Safe,
    /// Return views aliasing the input and skip key re-validation.
    Fast,
}

/// A read cursor over an encoded protobuf message.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
    mode: Mode,
    /// Start and end of the most recently read key.
    last_key: Option<(usize, usize)>,
}

impl<'a> Decoder<'a> {
    /// Create a [`Mode::Safe`] decoder positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_mode(buf, Mode::Safe)
    }

    pub fn with_mode(buf: &'a [u8], mode: Mode) -> Self {
        Decoder {
            buf,
            offset: 0,
            mode,
            last_key: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of unread bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Returns `true` while unread bytes remain.
    #[inline]
    pub fn more(&self) -> bool {
        self.offset < self.buf.len()
    }

    #[inline(always)]
    fn rest(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    /// Moves the cursor to wherever `cursor`, a suffix of the input, begins.
    #[inline(always)]
    fn commit(&mut self, cursor: &'a [u8]) {
        self.offset = self.buf.len() - cursor.len();
    }

    /// Read the next field key.
    pub fn decode_tag(&mut self) -> Result<(u32, WireType), DecodeError> {
        let start = self.offset;
        let mut cursor = self.rest();
        let key = wire::decode_key(&mut cursor)?;
        self.commit(cursor);
        self.last_key = Some((start, self.offset));
        Ok(key.into_parts())
    }

    /// Read one scalar value, the key must already have been consumed.
    #[inline]
    pub fn decode_scalar<T: ProtoScalar>(&mut self) -> Result<T, DecodeError> {
        let mut cursor = self.rest();
        let value = T::decode_value(&mut cursor)?;
        self.commit(cursor);
        Ok(value)
    }

    /// Read a length prefix and return a view of that many bytes.
    ///
    /// The view always borrows the input regardless of [`Mode`], it is the
    /// building block the mode-aware accessors are made of.
    pub fn decode_len_delimited(&mut self) -> Result<&'a [u8], DecodeError> {
        let mut cursor = self.rest();
        let payload = take_len_delimited(&mut cursor)?;
        self.commit(cursor);
        Ok(payload)
    }

    /// Read a `bytes` value.
    ///
    /// [`Mode::Safe`] returns an owned copy, [`Mode::Fast`] a view of the input.
    pub fn decode_bytes(&mut self) -> Result<Cow<'a, [u8]>, DecodeError> {
        let payload = self.decode_len_delimited()?;
        Ok(match self.mode {
            Mode::Safe => Cow::Owned(payload.to_vec()),
            Mode::Fast => Cow::Borrowed(payload),
        })
    }

    /// Read a `string` value, failing with [`DecodeError::InvalidUtf8`] if the
    /// payload isn't UTF-8.
    pub fn decode_string(&mut self) -> Result<Cow<'a, str>, DecodeError> {
        let mut cursor = self.rest();
        let payload = take_len_delimited(&mut cursor)?;
        let value = core::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
        self.commit(cursor);
        Ok(match self.mode {
            Mode::Safe => Cow::Owned(String::from(value)),
            Mode::Fast => Cow::Borrowed(value),
        })
    }

    /// Consume and return every unread byte.
    pub fn decode_remaining(&mut self) -> &'a [u8] {
        let rest = self.rest();
        self.offset = self.buf.len();
        rest
    }

    /// Read a packed repeated field's payload and decode every element in it.
    pub fn decode_packed<T: ProtoScalar>(&mut self) -> Result<Vec<T>, DecodeError> {
        let mut cursor = self.rest();
        let payload = take_len_delimited(&mut cursor)?;
        let values = packed::decode_packed(payload)?;
        self.commit(cursor);
        Ok(values)
    }

    /// Skip the value of a field whose key was just read, returning the exact
    /// bytes of the whole field, key included, as they appeared in the input.
    ///
    /// In [`Mode::Safe`] the key read by the preceding [`Decoder::decode_tag`]
    /// must decode to `(tag, wire_type)`, otherwise this fails with
    /// [`DecodeError::TagMismatch`]. [`Mode::Fast`] trusts the caller, and
    /// without a preceding key assumes a minimally encoded one. Groups are not
    /// supported.
    pub fn skip(&mut self, tag: u32, wire_type: WireType) -> Result<&'a [u8], DecodeError> {
        let key_start = match self.mode {
            Mode::Safe => self.check_preceding_key(tag, wire_type)?,
            Mode::Fast => match self.preceding_key() {
                Some((start, _)) => start,
                None => self.offset.saturating_sub(size::size_of_tag(tag)),
            },
        };

        let mut cursor = self.rest();
        wire::skip_field(wire_type, &mut cursor)?;
        self.commit(cursor);
        Ok(&self.buf[key_start..self.offset])
    }

    /// The last key read, if the cursor still sits right after it.
    #[inline]
    fn preceding_key(&self) -> Option<(usize, usize)> {
        self.last_key.filter(|&(_, end)| end == self.offset)
    }

    fn check_preceding_key(&self, tag: u32, wire_type: WireType) -> Result<usize, DecodeError> {
        let expected = (u64::from(tag) << 3) | u64::from(wire_type.into_val());
        let Some((start, end)) = self.preceding_key() else {
            return Err(DecodeError::tag_mismatch(tag, wire_type, 0));
        };
        match wire::decode_varint(&self.buf[start..end]) {
            Ok((raw, _)) if raw == expected => Ok(start),
            Ok((raw, _)) => Err(DecodeError::tag_mismatch(tag, wire_type, raw)),
            Err(_) => Err(DecodeError::tag_mismatch(tag, wire_type, 0)),
        }
    }

    /// Decode a length-delimited sub-message into `message`.
    ///
    /// A zero length leaves `message` untouched. Otherwise exactly the declared
    /// payload is handed to [`MessageDecode::merge_from`] through a decoder in
    /// the same [`Mode`]. If the message fails part way it may already hold
    /// some merged fields, the cursor is left before the length prefix.
    pub fn decode_nested<M: MessageDecode + ?Sized>(
        &mut self,
        message: &mut M,
    ) -> Result<(), DecodeError> {
        let mut cursor = self.rest();
        let payload = take_len_delimited(&mut cursor)?;
        if !payload.is_empty() {
            let mut nested = Decoder::with_mode(payload, self.mode);
            message.merge_from(&mut nested)?;
        }
        self.commit(cursor);
        Ok(())
    }
}

/// Splits a length prefix and its payload off the front of `cursor`.
///
/// The length is compared against what's left rather than added to an offset,
/// so a corrupted prefix can never wrap around or read out of bounds.
#[inline]
pub(crate) fn take_len_delimited<'a>(cursor: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = wire::decode_len(cursor)?;
    if len > cursor.len() {
        return Err(DecodeError::unexpected_end_of_buffer());
    }
    let (payload, rest) = cursor.split_at(len);
    *cursor = rest;
    Ok(payload)
}

macro_rules! decode_scalars {
    ($($(#[$meta:meta])* $name:ident -> $ty:ty as $proto:ty;)+) => {$(
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self) -> Result<$ty, DecodeError> {
            self.decode_scalar::<$proto>().map(<$ty>::from)
        }
    )+};
}

macro_rules! decode_packed_scalars {
    ($($name:ident -> $ty:ty as $proto:ty;)+) => {$(
        #[inline]
        pub fn $name(&mut self) -> Result<Vec<$ty>, DecodeError> {
            self.decode_packed::<$proto>()
                .map(|values| values.into_iter().map(<$ty>::from).collect())
        }
    )+};
}

impl Decoder<'_> {
    decode_scalars! {
        /// Any non-zero varint is `true`.
        decode_bool -> bool as bool;
        decode_int32 -> i32 as i32;
        decode_int64 -> i64 as i64;
        decode_uint32 -> u32 as u32;
        decode_uint64 -> u64 as u64;
        decode_sint32 -> i32 as Sint32;
        decode_sint64 -> i64 as Sint64;
        decode_fixed32 -> u32 as Fixed32;
        decode_fixed64 -> u64 as Fixed64;
        decode_sfixed32 -> i32 as Sfixed32;
        decode_sfixed64 -> i64 as Sfixed64;
        decode_float -> f32 as f32;
        decode_double -> f64 as f64;
        /// Unknown enum values are returned as-is.
        decode_enum -> i32 as i32;
    }

    decode_packed_scalars! {
        decode_packed_bool -> bool as bool;
        decode_packed_int32 -> i32 as i32;
        decode_packed_int64 -> i64 as i64;
        decode_packed_uint32 -> u32 as u32;
        decode_packed_uint64 -> u64 as u64;
        decode_packed_sint32 -> i32 as Sint32;
        decode_packed_sint64 -> i64 as Sint64;
        decode_packed_fixed32 -> u32 as Fixed32;
        decode_packed_fixed64 -> u64 as Fixed64;
        decode_packed_sfixed32 -> i32 as Sfixed32;
        decode_packed_sfixed64 -> i64 as Sfixed64;
        decode_packed_float -> f32 as f32;
        decode_packed_double -> f64 as f64;
        decode_packed_enum -> i32 as i32;
    }
}
