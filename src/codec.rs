//! Shared big-endian / length-prefixed encoding used by both [`crate::page::Page`]
//! and the on-disk log record format (§4.8), so the two on-disk layouts
//! never drift out of sync with each other.
//!
//! `max_length`'s `4 + n` arithmetic only holds for ASCII content (one byte
//! per character); `encode_string` enforces that at the point of encoding,
//! the same place the original `Page.set_string` raises on non-ASCII input.

use snafu::ensure;

use crate::errors::{DbResult, LogCorruptionSnafu};

/// Number of bytes an `i32` occupies on disk or in a page.
pub const INT_BYTES: usize = 4;

/// On-page/on-log size of a length-prefixed string of `char_count` ASCII
/// characters: the 4-byte length prefix plus one byte per character.
pub const fn max_length(char_count: usize) -> usize {
    INT_BYTES + char_count
}

pub fn encode_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Decodes a trusted in-memory `i32` at `offset`.
///
/// Used only against buffers this process wrote itself (a `Page`'s own
/// contents); bytes read back off disk into a log record go through
/// [`try_decode_i32`] instead, since those bytes can be corrupted.
pub fn decode_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut raw = [0u8; INT_BYTES];
    raw.copy_from_slice(&bytes[offset..offset + INT_BYTES]);
    i32::from_be_bytes(raw)
}

pub fn encode_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    encode_i32(buf, value.len() as i32);
    buf.extend_from_slice(value);
}

/// Decodes a trusted length-prefixed byte string starting at `offset`,
/// returning the bytes and the offset of the field immediately following
/// it. See [`decode_i32`] on why this is only safe against self-written
/// buffers.
pub fn decode_bytes(bytes: &[u8], offset: usize) -> (Vec<u8>, usize) {
    let len = decode_i32(bytes, offset) as usize;
    let start = offset + INT_BYTES;
    let end = start + len;
    (bytes[start..end].to_vec(), end)
}

/// Encodes `value` as a length-prefixed ASCII string.
///
/// Panics if `value` is not ASCII: `max_length` sizes a string field as
/// `4 + char_count`, which only accounts for one byte per character, so a
/// multi-byte UTF-8 character would overrun whatever field was sized for
/// it. This mirrors the original `Page.set_string`'s `str.encode('ascii')`,
/// which raises on the same input.
pub fn encode_string(buf: &mut Vec<u8>, value: &str) {
    assert!(
        value.is_ascii(),
        "string value {value:?} is not ASCII; Page/log string fields are sized as 4 + char_count \
         and cannot hold multi-byte characters"
    );
    encode_bytes(buf, value.as_bytes());
}

/// Decodes a trusted length-prefixed ASCII string starting at `offset`,
/// returning the string and the offset of the field immediately following
/// it. See [`decode_i32`] on why this is only safe against self-written
/// buffers.
pub fn decode_string(bytes: &[u8], offset: usize) -> (String, usize) {
    let (raw, next) = decode_bytes(bytes, offset);
    (String::from_utf8_lossy(&raw).into_owned(), next)
}

/// Decodes an `i32` at `offset` out of an untrusted byte stream (a log
/// record read back off disk), failing with `LogCorruption` rather than
/// panicking if `offset` doesn't leave room for a full `i32`.
pub fn try_decode_i32(bytes: &[u8], offset: usize) -> DbResult<i32> {
    ensure!(
        offset.checked_add(INT_BYTES).is_some_and(|end| end <= bytes.len()),
        LogCorruptionSnafu {
            reason: format!(
                "int field at offset {offset} overruns the record ({} bytes available)",
                bytes.len()
            ),
        }
    );
    Ok(decode_i32(bytes, offset))
}

/// Decodes a length-prefixed byte string at `offset` out of an untrusted
/// byte stream, failing with `LogCorruption` instead of panicking if the
/// declared length would read past the end of `bytes`.
pub fn try_decode_bytes(bytes: &[u8], offset: usize) -> DbResult<(Vec<u8>, usize)> {
    let len = try_decode_i32(bytes, offset)?;
    ensure!(
        len >= 0,
        LogCorruptionSnafu {
            reason: format!("negative length prefix {len} at offset {offset}"),
        }
    );
    let len = len as usize;
    let start = offset + INT_BYTES;
    ensure!(
        start.checked_add(len).is_some_and(|end| end <= bytes.len()),
        LogCorruptionSnafu {
            reason: format!(
                "length-prefixed field at offset {offset} declares {len} bytes, \
                 which overruns the record ({} bytes available)",
                bytes.len()
            ),
        }
    );
    let end = start + len;
    Ok((bytes[start..end].to_vec(), end))
}

/// String counterpart of [`try_decode_bytes`].
pub fn try_decode_string(bytes: &[u8], offset: usize) -> DbResult<(String, usize)> {
    let (raw, next) = try_decode_bytes(bytes, offset)?;
    Ok((String::from_utf8_lossy(&raw).into_owned(), next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_decode_i32_rejects_truncated_input() {
        let err = try_decode_i32(&[0u8, 1, 2], 0).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }

    #[test]
    fn try_decode_bytes_rejects_length_prefix_past_end_of_buffer() {
        let mut buf = Vec::new();
        encode_i32(&mut buf, 1_000_000);
        buf.extend_from_slice(b"short");
        let err = try_decode_bytes(&buf, 0).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }

    #[test]
    fn try_decode_bytes_rejects_negative_length_prefix() {
        let mut buf = Vec::new();
        encode_i32(&mut buf, -1);
        let err = try_decode_bytes(&buf, 0).unwrap_err();
        assert!(matches!(err, crate::errors::DbError::LogCorruption { .. }));
    }

    #[test]
    #[should_panic(expected = "is not ASCII")]
    fn encode_string_rejects_non_ascii() {
        let mut buf = Vec::new();
        encode_string(&mut buf, "héllo");
    }
}
