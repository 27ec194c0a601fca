//! Geo record decoding.
//!
//! A record is a country string followed by a region string. Either may be
//! stored inline or as a pointer to a shared string, and the whole record
//! may itself be a pointer to another record:
//!
//! ```text
//! full redirect:  [0x01][offset:u24]            -> record at offset
//! country:        [0x02][offset:u24] | "text\0"
//! region:         [0x02][offset:u24] | "text\0"
//! ```
//!
//! Decoding is best-effort: reads that would leave the buffer produce empty
//! or truncated strings rather than errors.

use encoding_rs::GB18030;

use super::format::*;
use crate::error::CodecError;

/// Decoded (country, region) pair of a range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GeoRecord {
    /// Country (or broad location) text
    pub country: String,
    /// Region (province, city, or carrier) text
    pub region: String,
}

impl GeoRecord {
    /// Create a record from its two fields.
    pub fn new(country: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
        }
    }
}

impl std::fmt::Display for GeoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.region.is_empty() {
            write!(f, "{}", self.country)
        } else {
            write!(f, "{} {}", self.country, self.region)
        }
    }
}

/// Layout of the record as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Country starts at the record offset
    Direct,
    /// The record lives at another offset
    FullRedirect(u32),
}

/// Layout of one string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Null-terminated text at the field offset
    Inline,
    /// Null-terminated text at another offset; the field occupies 4 bytes
    Pointer(u32),
}

/// Inspect the mode byte at the start of a record.
pub fn record_mode(buf: &[u8], offset: usize) -> Result<RecordMode, CodecError> {
    match read_u8(buf, offset)? {
        MODE_FULL_REDIRECT => Ok(RecordMode::FullRedirect(read_u24_le(buf, offset + 1)?)),
        _ => Ok(RecordMode::Direct),
    }
}

/// Inspect the mode byte at the start of a string field.
pub fn field_mode(buf: &[u8], offset: usize) -> Result<FieldMode, CodecError> {
    match read_u8(buf, offset)? {
        MODE_STRING_REDIRECT => Ok(FieldMode::Pointer(read_u24_le(buf, offset + 1)?)),
        _ => Ok(FieldMode::Inline),
    }
}

/// Resolve the raw (country, region) bytes of the record at `offset`.
pub fn decode_raw(buf: &[u8], offset: usize) -> (&[u8], &[u8]) {
    let offset = match record_mode(buf, offset) {
        Ok(RecordMode::FullRedirect(target)) => target as usize,
        Ok(RecordMode::Direct) => offset,
        Err(e) => {
            log::trace!("unreadable record at {}: {}", offset, e);
            return (&[], &[]);
        }
    };

    // A redirected record is read with field rules only, so a second 0x01
    // is taken as inline text and chains cannot loop.
    let (country, cursor) = match field_mode(buf, offset) {
        Ok(FieldMode::Pointer(target)) => (scan_cstring(buf, target as usize), offset + REDIRECT_SIZE),
        Ok(FieldMode::Inline) => {
            let text = scan_cstring(buf, offset);
            (text, offset + text.len() + 1)
        }
        Err(e) => {
            log::trace!("unreadable country at {}: {}", offset, e);
            return (&[], &[]);
        }
    };

    let region = match field_mode(buf, cursor) {
        Ok(FieldMode::Pointer(target)) => scan_cstring(buf, target as usize),
        Ok(FieldMode::Inline) => scan_cstring(buf, cursor),
        Err(e) => {
            log::trace!("unreadable region at {}: {}", cursor, e);
            &[]
        }
    };

    (country, region)
}

/// Decode the record at `offset` into text.
pub fn decode_record(buf: &[u8], offset: usize) -> GeoRecord {
    let (country, region) = decode_raw(buf, offset);
    GeoRecord {
        country: decode_text(country),
        region: decode_text(region),
    }
}

/// Transcode stored GB18030 bytes, replacing malformed sequences with U+FFFD.
pub fn decode_text(bytes: &[u8]) -> String {
    let (text, had_errors) = GB18030.decode_without_bom_handling(bytes);
    if had_errors {
        log::trace!("replaced malformed GB18030 in {} byte string", bytes.len());
    }
    text.into_owned()
}

/// Encode text into the stored GB18030 form.
pub fn encode_text(text: &str) -> Vec<u8> {
    GB18030.encode(text).0.into_owned()
}
