//! Varint (LEB128) encoding used by the container record log.
//!
//! Lengths, and nothing else, are varint encoded: read ids, run ids, group
//! names and group payloads are all written as `<varint len><bytes>`.

/// Maximum number of bytes needed to encode a u64 as LEB128 varint.
pub(crate) const MAX_VARINT_BYTES: usize = 10;

/// Error type for varint decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarIntError {
    /// Buffer ended before varint was complete (continuation bit was set on last byte).
    /// Contains the number of bytes that were available.
    Truncated(usize),
    /// Varint exceeds maximum size (>10 bytes for u64).
    /// Contains the number of bytes consumed before overflow.
    Overflow(usize),
}

impl std::fmt::Display for VarIntError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarIntError::Truncated(bytes) => {
                write!(
                    f,
                    "Truncated varint: buffer ended after {} bytes with continuation bit set",
                    bytes
                )
            }
            VarIntError::Overflow(bytes) => {
                write!(
                    f,
                    "Malformed varint: exceeded 10 bytes at {} bytes consumed",
                    bytes
                )
            }
        }
    }
}

impl std::error::Error for VarIntError {}

/// Encode a u64 as a variable-length integer (LEB128 format).
///
/// # Returns
/// The number of bytes written to buf (buf must hold `MAX_VARINT_BYTES`).
#[inline]
pub(crate) fn encode_varint(mut value: u64, buf: &mut [u8]) -> usize {
    let mut i = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[i] = byte;
            return i + 1;
        } else {
            buf[i] = byte | 0x80;
            i += 1;
        }
    }
}

/// Decode a variable-length integer from a byte slice.
///
/// # Returns
/// * `Ok((value, bytes_consumed))` - Successfully decoded varint
/// * `Err(VarIntError::Truncated(n))` - Buffer ended with continuation bit set after n bytes
/// * `Err(VarIntError::Overflow(n))` - Varint exceeded 10 bytes
#[inline]
pub(crate) fn decode_varint(buf: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut value: u64 = 0;
    let mut shift = 0;
    let mut i = 0;
    loop {
        if i >= buf.len() {
            return Err(VarIntError::Truncated(i));
        }
        let byte = buf[i];
        value |= ((byte & 0x7F) as u64) << shift;
        i += 1;
        if byte & 0x80 == 0 {
            return Ok((value, i));
        }
        shift += 7;
        if shift >= 64 {
            return Err(VarIntError::Overflow(i));
        }
    }
}

/// Append a varint to an output buffer.
#[inline]
pub(crate) fn put_varint(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode_varint(value, &mut buf);
    out.extend_from_slice(&buf[..len]);
}

/// Append a length-prefixed byte string to an output buffer.
#[inline]
pub(crate) fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_boundaries() {
        let mut buf = [0u8; MAX_VARINT_BYTES];

        for (val, expected_len) in [(0u64, 1), (127, 1), (128, 2), (16383, 2), (16384, 3)] {
            let len = encode_varint(val, &mut buf);
            assert_eq!(len, expected_len, "length for {}", val);
            let (decoded, consumed) = decode_varint(&buf[..len]).expect("decode failed");
            assert_eq!(decoded, val);
            assert_eq!(consumed, len);
        }

        let len = encode_varint(u64::MAX, &mut buf);
        assert_eq!(len, MAX_VARINT_BYTES);
        assert_eq!(decode_varint(&buf[..len]).unwrap().0, u64::MAX);
    }

    #[test]
    fn test_decode_varint_truncated() {
        let buf = [0x80, 0x80];
        assert_eq!(decode_varint(&buf), Err(VarIntError::Truncated(2)));
        assert_eq!(decode_varint(&[]), Err(VarIntError::Truncated(0)));
    }

    #[test]
    fn test_decode_varint_overflow() {
        let buf = [0xFF; 11];
        assert!(matches!(decode_varint(&buf), Err(VarIntError::Overflow(_))));
    }

    #[test]
    fn test_put_bytes_prefixes_length() {
        let mut out = Vec::new();
        put_bytes(&mut out, b"read_1");
        assert_eq!(out[0], 6);
        assert_eq!(&out[1..], b"read_1");
    }
}
