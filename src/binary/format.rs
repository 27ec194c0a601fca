//! Binary format constants and fixed-width readers.

use crate::error::CodecError;

/// Header size in bytes: `index_begin` (u32 LE) followed by `index_end` (u32 LE).
pub const HEADER_SIZE: usize = 8;

/// Size of one packed range index entry: `ip_begin` (u32) + `record_pointer` (u24).
pub const INDEX_ENTRY_SIZE: usize = 7;

/// Size of the `ip_end` field stored in front of every geo record.
pub const IP_END_SIZE: usize = 4;

/// Largest offset expressible by a 24-bit pointer.
pub const MAX_OFFSET: usize = 0xFF_FFFF;

/// Mode byte: the whole record is a pointer to another record.
pub const MODE_FULL_REDIRECT: u8 = 0x01;

/// Mode byte: the field is a pointer to a string elsewhere in the file.
pub const MODE_STRING_REDIRECT: u8 = 0x02;

/// Size of a mode byte followed by a 24-bit pointer.
pub const REDIRECT_SIZE: usize = 4;

fn check(buf: &[u8], offset: usize, len: usize) -> Result<(), CodecError> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(CodecError::OutOfBounds {
            offset,
            len,
            size: buf.len(),
        }),
    }
}

/// Read a single byte at `offset`.
pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8, CodecError> {
    check(buf, offset, 1)?;
    Ok(buf[offset])
}

/// Read a 3-byte little-endian unsigned integer at `offset`.
pub fn read_u24_le(buf: &[u8], offset: usize) -> Result<u32, CodecError> {
    check(buf, offset, 3)?;
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        0,
    ]))
}

/// Read a 4-byte little-endian unsigned integer at `offset`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32, CodecError> {
    check(buf, offset, 4)?;
    Ok(u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

/// Read a null-terminated byte string at `offset`.
///
/// The terminator is not included. An unterminated string runs to the end
/// of the buffer. Fails only if `offset` itself lies outside the buffer.
pub fn read_cstring(buf: &[u8], offset: usize) -> Result<&[u8], CodecError> {
    if offset >= buf.len() {
        return Err(CodecError::OutOfBounds {
            offset,
            len: 1,
            size: buf.len(),
        });
    }
    Ok(scan_cstring(buf, offset))
}

/// Best-effort variant of [`read_cstring`] used by the record decoder.
///
/// Clamps to the remaining length instead of failing; an offset past the
/// end yields an empty string.
pub fn scan_cstring(buf: &[u8], offset: usize) -> &[u8] {
    let tail = buf.get(offset..).unwrap_or_default();
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    &tail[..len]
}

/// Write a 3-byte little-endian unsigned integer.
pub(crate) fn put_u24_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}
