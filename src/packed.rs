//! Packed repeated fields: one length-delimited run of key-less values.
//!
//! For fixed-size types the payload length must be an exact multiple of the
//! element width, which is checked once up front before a tight
//! `chunks_exact` loop. Varint payloads are walked element by element.

use alloc::vec::Vec;

use crate::error::DecodeError;
use crate::scalar::ProtoScalar;

/// Decode every element of a packed payload (without its length prefix),
/// appending them to `dst`.
///
/// A trailing partial element fails with [`DecodeError::PackedDataCorrupt`].
/// On failure `dst` may hold the elements decoded before the corrupt one.
pub fn decode_packed_into<T: ProtoScalar>(
    data: &[u8],
    dst: &mut Vec<T>,
) -> Result<(), DecodeError> {
    match T::WIRE_TYPE.fixed_len() {
        Some(width) => {
            if data.len() % width != 0 {
                return Err(DecodeError::packed_data_corrupt(
                    "length is not a multiple of the element width",
                ));
            }
            dst.reserve(data.len() / width);
            for mut chunk in data.chunks_exact(width) {
                dst.push(T::decode_value(&mut chunk)?);
            }
        }
        None => {
            // Every varint is at least one byte, most small values are one or two.
            dst.reserve(data.len() / 2);
            let mut cursor = data;
            while !cursor.is_empty() {
                let value = T::decode_value(&mut cursor).map_err(|err| match err {
                    DecodeError::InvalidVarint | DecodeError::UnexpectedEndOfBuffer => {
                        DecodeError::packed_data_corrupt("truncated or malformed varint element")
                    }
                    other => other,
                })?;
                dst.push(value);
            }
        }
    }
    Ok(())
}

/// Decode every element of a packed payload and return them as a new vector.
pub fn decode_packed<T: ProtoScalar>(data: &[u8]) -> Result<Vec<T>, DecodeError> {
    let mut result = Vec::new();
    decode_packed_into(data, &mut result)?;
    Ok(result)
}

/// Encode `values` back to back without keys or a length prefix.
pub fn encode_packed_payload<T: ProtoScalar, B: bytes::BufMut>(values: &[T], buf: &mut B) {
    for value in values {
        value.encode_value(buf);
    }
}

/// The number of bytes [`encode_packed_payload`] writes for `values`.
pub fn packed_payload_len<T: ProtoScalar>(values: &[T]) -> usize {
    match T::WIRE_TYPE.fixed_len() {
        Some(width) => width * values.len(),
        None => values.iter().map(|value| value.encoded_value_len()).sum(),
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::scalar::{Fixed32, Fixed64, Sfixed32, Sfixed64, Sint32, Sint64};

    fn encode_values<T: ProtoScalar>(values: &[T]) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_packed_payload(values, &mut buf);
        assert_eq!(buf.len(), packed_payload_len(values));
        buf
    }

    #[test]
    fn test_decode_packed_fixed() {
        let values = vec![Fixed32(1), Fixed32(2), Fixed32(u32::MAX)];
        assert_eq!(decode_packed::<Fixed32>(&encode_values(&values)).unwrap(), values);

        let values = vec![Fixed64(1), Fixed64(2), Fixed64(u64::MAX)];
        assert_eq!(decode_packed::<Fixed64>(&encode_values(&values)).unwrap(), values);

        let values = vec![Sfixed32(-1), Sfixed32(0), Sfixed32(i32::MAX)];
        assert_eq!(decode_packed::<Sfixed32>(&encode_values(&values)).unwrap(), values);

        let values = vec![Sfixed64(-1), Sfixed64(0), Sfixed64(i64::MAX)];
        assert_eq!(decode_packed::<Sfixed64>(&encode_values(&values)).unwrap(), values);
    }

    #[test]
    fn test_decode_packed_floats() {
        let values = vec![1.0f32, -2.5f32, f32::MAX];
        assert_eq!(decode_packed::<f32>(&encode_values(&values)).unwrap(), values);

        let values = vec![1.0f64, -2.5f64, f64::MAX];
        assert_eq!(decode_packed::<f64>(&encode_values(&values)).unwrap(), values);
    }

    #[test]
    fn test_decode_packed_varints() {
        let values = vec![0i32, -1, 300, i32::MIN, i32::MAX];
        assert_eq!(decode_packed::<i32>(&encode_values(&values)).unwrap(), values);

        let values = vec![Sint32(-1), Sint32(1), Sint32(i32::MIN)];
        assert_eq!(decode_packed::<Sint32>(&encode_values(&values)).unwrap(), values);

        let values = vec![Sint64(-1), Sint64(i64::MAX)];
        assert_eq!(decode_packed::<Sint64>(&encode_values(&values)).unwrap(), values);

        let values = vec![true, false, true];
        assert_eq!(decode_packed::<bool>(&encode_values(&values)).unwrap(), values);
    }

    #[test]
    fn test_decode_packed_large() {
        let values: Vec<Fixed32> = (0..1000).map(Fixed32).collect();
        assert_eq!(decode_packed::<Fixed32>(&encode_values(&values)).unwrap(), values);

        let values: Vec<u64> = (0..1000).map(|v| v * 1_000_003).collect();
        assert_eq!(decode_packed::<u64>(&encode_values(&values)).unwrap(), values);
    }

    #[test]
    fn test_decode_packed_empty() {
        assert!(decode_packed::<Fixed32>(&[]).unwrap().is_empty());
        assert!(decode_packed::<u64>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_packed_partial_element() {
        assert!(matches!(
            decode_packed::<Fixed32>(&[1, 2, 3, 4, 5]),
            Err(DecodeError::PackedDataCorrupt { .. })
        ));
        // Second varint is missing its final byte.
        assert!(matches!(
            decode_packed::<u64>(&[0x01, 0x80]),
            Err(DecodeError::PackedDataCorrupt { .. })
        ));
    }

    #[test]
    fn test_decode_packed_overflow_is_reported() {
        let data = encode_values(&[u64::from(u32::MAX) + 1]);
        assert!(matches!(
            decode_packed::<u32>(&data),
            Err(DecodeError::IntegerOverflow { .. })
        ));
    }
}
