//! LEB128 variable-length integer encoding/decoding, the "varint" of the
//! protobuf wire format.

// This module uses `as` casts which have been thoroughly reviewed for correctness.
#![allow(clippy::as_conversions)]

use crate::error::DecodeError;
use crate::util::likely;

/// Types that can be encoded as and decoded from a LEB128 integer.
pub trait LebCodec: Sized + Copy {
    /// Maximum number of bytes read while decoding a `Self`.
    const MAX_LEB_BYTES: usize;

    /// Decode a LEB128 variable length integer from the front of `data`.
    ///
    /// Returns a tuple of the decoded value and the number of bytes read to
    /// decode said value. Fails with [`DecodeError::InvalidVarint`] if `data`
    /// runs out before a terminating byte or none appears within
    /// [`LebCodec::MAX_LEB_BYTES`]. A well formed varint whose value doesn't
    /// fit `Self` fails with [`DecodeError::IntegerOverflow`].
    fn decode_leb128(data: &[u8]) -> Result<(Self, usize), DecodeError>;

    /// Decode a LEB128 integer from a [`bytes::Buf`], advancing it past the
    /// bytes read.
    fn decode_leb128_buf<B: bytes::Buf>(buf: &mut B) -> Result<(Self, usize), DecodeError> {
        let chunk = buf.chunk();

        // Fast path: the current chunk either holds the longest possible
        // encoding or is everything the buffer has left.
        if likely(chunk.len() >= Self::MAX_LEB_BYTES || chunk.len() == buf.remaining()) {
            let (value, bytes_read) = Self::decode_leb128(chunk)?;
            buf.advance(bytes_read);
            return Ok((value, bytes_read));
        }

        // Slow path: the integer straddles chunks, read byte by byte.
        let mut scratch = [0u8; 10];
        for i in 0..Self::MAX_LEB_BYTES {
            if !buf.has_remaining() {
                return Err(DecodeError::invalid_varint());
            }
            scratch[i] = buf.get_u8();
            if scratch[i] < 0x80 {
                return Self::decode_leb128(&scratch[..=i]);
            }
        }
        Err(DecodeError::invalid_varint())
    }

    /// Encode `self` as a LEB128 variable length integer into the provided
    /// buffer, returning the number of bytes written.
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize;

    /// The number of bytes required to encode this integer.
    fn encoded_leb128_len(self) -> usize;
}

impl LebCodec for u64 {
    const MAX_LEB_BYTES: usize = 10;

    #[inline]
    fn decode_leb128(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        // Most varints on the wire (keys, small lengths) are a single byte.
        match data.first() {
            Some(&b) if b < 0x80 => return Ok((u64::from(b), 1)),
            None => return Err(DecodeError::invalid_varint()),
            Some(_) => (),
        }

        let mut value = 0u64;
        for (i, &b) in data.iter().take(Self::MAX_LEB_BYTES).enumerate() {
            // The tenth byte only has room for the final bit of a u64.
            if i == Self::MAX_LEB_BYTES - 1 && b > 0x01 {
                return Err(DecodeError::invalid_varint());
            }
            value |= u64::from(b & 0x7f) << (7 * i);
            if b < 0x80 {
                return Ok((value, i + 1));
            }
        }

        // We either ran out of input or read 10 bytes without finding the
        // final byte.
        Err(DecodeError::invalid_varint())
    }

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        let mut value = self;
        let mut written = 1;
        while value >= 0x80 {
            buf.put_u8((value as u8) | 0x80);
            value >>= 7;
            written += 1;
        }
        buf.put_u8(value as u8);
        written
    }

    /// Compute the LEB128 encoded length using leading_zeros.
    ///
    /// LEB128 encodes 7 bits per byte. The number of bytes needed is
    /// ceil(significant_bits / 7), with a minimum of 1 byte for value 0.
    #[inline]
    fn encoded_leb128_len(self) -> usize {
        // Lookup table mapping leading_zeros (0-64) to LEB128 byte count.
        // Index 64 (value 0) maps to 1 byte.
        #[rustfmt::skip]
        const LZ_TO_LEN: [u8; 65] = [
            10,                                         // 0:     64 bits -> 10 bytes
            9, 9, 9, 9, 9, 9, 9,                        // 1-7:   63-57 bits -> 9 bytes
            8, 8, 8, 8, 8, 8, 8,                        // 8-14:  56-50 bits -> 8 bytes
            7, 7, 7, 7, 7, 7, 7,                        // 15-21: 49-43 bits -> 7 bytes
            6, 6, 6, 6, 6, 6, 6,                        // 22-28: 42-36 bits -> 6 bytes
            5, 5, 5, 5, 5, 5, 5,                        // 29-35: 35-29 bits -> 5 bytes
            4, 4, 4, 4, 4, 4, 4,                        // 36-42: 28-22 bits -> 4 bytes
            3, 3, 3, 3, 3, 3, 3,                        // 43-49: 21-15 bits -> 3 bytes
            2, 2, 2, 2, 2, 2, 2,                        // 50-56: 14-8 bits  -> 2 bytes
            1, 1, 1, 1, 1, 1, 1, 1,                     // 57-64: 7-0 bits   -> 1 byte
        ];

        LZ_TO_LEN[self.leading_zeros() as usize] as usize
    }
}

impl LebCodec for u32 {
    // Read at full 64-bit width, the value is range checked afterwards.
    const MAX_LEB_BYTES: usize = 10;

    /// Decodes as a `u64` first, so a well formed varint that doesn't fit in
    /// 32 bits fails with [`DecodeError::IntegerOverflow`] rather than
    /// [`DecodeError::InvalidVarint`].
    #[inline]
    fn decode_leb128(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        if let Some(&b) = data.first() {
            if b < 0x80 {
                return Ok((u32::from(b), 1));
            }
        }

        let (value, bytes_read) = u64::decode_leb128(data)?;
        let value =
            u32::try_from(value).map_err(|_| DecodeError::integer_overflow(value, "uint32"))?;
        Ok((value, bytes_read))
    }

    #[inline]
    fn encode_leb128<B: bytes::BufMut>(self, buf: &mut B) -> usize {
        u64::from(self).encode_leb128(buf)
    }

    #[inline]
    fn encoded_leb128_len(self) -> usize {
        // Lookup table mapping leading_zeros (0-32) to LEB128 byte count.
        #[rustfmt::skip]
        const LZ_TO_LEN: [u8; 33] = [
            5, 5, 5, 5,                         // 0-3:   32-29 bits -> 5 bytes
            4, 4, 4, 4, 4, 4, 4,                // 4-10:  28-22 bits -> 4 bytes
            3, 3, 3, 3, 3, 3, 3,                // 11-17: 21-15 bits -> 3 bytes
            2, 2, 2, 2, 2, 2, 2,                // 18-24: 14-8 bits  -> 2 bytes
            1, 1, 1, 1, 1, 1, 1, 1,             // 25-32: 7-0 bits   -> 1 byte
        ];

        LZ_TO_LEN[self.leading_zeros() as usize] as usize
    }
}
