//! Message-level collaborator traits and helpers.
//!
//! The codec never reflects over a message's schema. A message type that wants
//! to be nested inside another implements [`MessageEncode`] and/or
//! [`MessageDecode`], typically via generated code driving an [`Encoder`] or
//! [`Decoder`] field by field.

use alloc::vec::Vec;

use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::DecodeError;
use crate::wire::WireType;

/// A message that can write itself into an [`Encoder`].
pub trait MessageEncode {
    /// Returns the encoded length of the message body (without length prefix).
    fn encoded_len(&self) -> usize;

    /// Encode the message body (without length prefix).
    ///
    /// Must write exactly [`MessageEncode::encoded_len`] bytes.
    fn encode_to(&self, enc: &mut Encoder<'_>);
}

/// A message that can populate itself from a [`Decoder`].
pub trait MessageDecode {
    /// Merge every field remaining in `dec` into `self`, following protobuf
    /// merging semantics: scalars overwrite, repeated fields append.
    fn merge_from(&mut self, dec: &mut Decoder<'_>) -> Result<(), DecodeError>;
}

/// Already-encoded message bytes.
///
/// The generic entry point for message types without generated code: encoding
/// writes the bytes verbatim and decoding appends the payload, which is exactly
/// protobuf's merge semantics for two encodings of the same message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage(pub Vec<u8>);

impl RawMessage {
    /// Returns the raw message bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for RawMessage {
    fn from(bytes: &[u8]) -> Self {
        RawMessage(bytes.to_vec())
    }
}

impl MessageEncode for RawMessage {
    #[inline]
    fn encoded_len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    fn encode_to(&self, enc: &mut Encoder<'_>) {
        enc.encode_raw(&self.0);
    }
}

impl MessageDecode for RawMessage {
    #[inline]
    fn merge_from(&mut self, dec: &mut Decoder<'_>) -> Result<(), DecodeError> {
        self.0.extend_from_slice(dec.decode_remaining());
        Ok(())
    }
}

/// Fields a message didn't recognize, kept byte-for-byte.
///
/// Feeding every unrecognized field through [`UnknownFields::skip_into`] and
/// re-emitting them with [`UnknownFields::encode_to`] round-trips a message
/// without losing data written by a newer schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFields {
    buf: Vec<u8>,
}

impl UnknownFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the field whose key was just read from `dec`, keeping its bytes.
    pub fn skip_into(
        &mut self,
        dec: &mut Decoder<'_>,
        tag: u32,
        wire_type: WireType,
    ) -> Result<(), DecodeError> {
        let raw = dec.skip(tag, wire_type)?;
        self.buf.extend_from_slice(raw);
        Ok(())
    }

    /// Append the bytes of an already-encoded field (key included).
    pub fn push_raw(&mut self, raw: &[u8]) {
        self.buf.extend_from_slice(raw);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes [`UnknownFields::encode_to`] writes.
    pub fn encoded_len(&self) -> usize {
        self.buf.len()
    }

    /// Re-emit every preserved field, in the order they were read.
    pub fn encode_to(&self, enc: &mut Encoder<'_>) {
        enc.encode_raw(&self.buf);
    }
}
