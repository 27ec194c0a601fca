//! Database image writer.

use ahash::AHashMap;

use super::format::*;
use super::record::encode_text;
use crate::error::BuildError;

/// One range queued for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRange {
    begin: u32,
    end: u32,
    country: String,
    region: String,
}

/// Builds database images from ordered, disjoint ranges.
///
/// Repeated data is shared the way published databases do it: a repeated
/// (country, region) pair becomes a full redirect to the first record, and
/// a repeated string becomes a pointer to its first occurrence.
///
/// # Example
///
/// ```
/// use k2geo::binary::DatabaseWriter;
///
/// let mut writer = DatabaseWriter::new();
/// writer.add_range(0x08080800, 0x080808FF, "US", "CA").unwrap();
/// let data = writer.build().unwrap();
/// assert!(data.len() > 8);
/// ```
#[derive(Debug, Default)]
pub struct DatabaseWriter {
    ranges: Vec<PendingRange>,
}

impl DatabaseWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ranges added so far.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges have been added.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Append a range.
    ///
    /// Ranges must be added in ascending order and must not overlap, and
    /// neither string may contain a NUL.
    pub fn add_range(
        &mut self,
        begin: u32,
        end: u32,
        country: &str,
        region: &str,
    ) -> Result<(), BuildError> {
        if end < begin {
            return Err(BuildError::InvertedRange { begin, end });
        }
        if let Some(previous) = self.ranges.last() {
            if begin <= previous.end {
                return Err(BuildError::Unordered {
                    begin,
                    previous_end: previous.end,
                });
            }
        }

        for text in [country, region] {
            if encode_text(text).contains(&0) {
                return Err(BuildError::InvalidText {
                    begin,
                    text: text.to_string(),
                });
            }
        }

        self.ranges.push(PendingRange {
            begin,
            end,
            country: country.to_string(),
            region: region.to_string(),
        });
        Ok(())
    }

    /// Serialize all ranges into a database image.
    pub fn build(&self) -> Result<Vec<u8>, BuildError> {
        if self.ranges.is_empty() {
            return Err(BuildError::Empty);
        }

        let mut buffer = vec![0u8; HEADER_SIZE];
        let mut strings: AHashMap<Vec<u8>, u32> = AHashMap::new();
        let mut records: AHashMap<(Vec<u8>, Vec<u8>), u32> = AHashMap::new();
        let mut index = Vec::with_capacity(self.ranges.len());

        for range in &self.ranges {
            let country = encode_text(&range.country);
            let region = encode_text(&range.region);
            let pair = (country, region);

            if let Some(&target) = records.get(&pair) {
                let pointer = offset_of(&buffer)?;
                buffer.extend_from_slice(&range.end.to_le_bytes());
                buffer.push(MODE_FULL_REDIRECT);
                put_u24_le(&mut buffer, target);
                index.push((range.begin, pointer));
                continue;
            }

            let (country, region) = &pair;

            // Text starting with a mode byte cannot be stored inline, so it
            // goes in front of the record and is referenced by pointer.
            if !strings.contains_key(country)
                && collides(country, &[MODE_FULL_REDIRECT, MODE_STRING_REDIRECT])
            {
                pool_string(&mut buffer, &mut strings, country)?;
            }
            if !strings.contains_key(region) && collides(region, &[MODE_STRING_REDIRECT]) {
                pool_string(&mut buffer, &mut strings, region)?;
            }

            let pointer = offset_of(&buffer)?;
            buffer.extend_from_slice(&range.end.to_le_bytes());

            let record = offset_of(&buffer)?;
            write_field(&mut buffer, &mut strings, country)?;
            write_field(&mut buffer, &mut strings, region)?;

            records.insert(pair, record);
            index.push((range.begin, pointer));
        }

        let index_begin = buffer.len();
        for (begin, pointer) in &index {
            buffer.extend_from_slice(&begin.to_le_bytes());
            put_u24_le(&mut buffer, *pointer);
        }
        let index_end = index_begin + (index.len() - 1) * INDEX_ENTRY_SIZE;
        let index_begin = u32::try_from(index_begin).map_err(|_| BuildError::TooLarge(index_begin))?;
        let index_end = u32::try_from(index_end).map_err(|_| BuildError::TooLarge(index_end))?;

        buffer[0..4].copy_from_slice(&index_begin.to_le_bytes());
        buffer[4..8].copy_from_slice(&index_end.to_le_bytes());

        log::debug!(
            "Built database: {} ranges, {} records, {} strings, {} bytes",
            index.len(),
            records.len(),
            strings.len(),
            buffer.len()
        );

        Ok(buffer)
    }
}

/// Current end of the buffer as a 24-bit offset.
fn offset_of(buffer: &[u8]) -> Result<u32, BuildError> {
    if buffer.len() > MAX_OFFSET {
        return Err(BuildError::TooLarge(buffer.len()));
    }
    Ok(buffer.len() as u32)
}

/// Whether the first byte of `text` would be read as one of `modes`.
fn collides(text: &[u8], modes: &[u8]) -> bool {
    text.first().is_some_and(|b| modes.contains(b))
}

fn pool_string(
    buffer: &mut Vec<u8>,
    strings: &mut AHashMap<Vec<u8>, u32>,
    text: &[u8],
) -> Result<(), BuildError> {
    let offset = offset_of(buffer)?;
    buffer.extend_from_slice(text);
    buffer.push(0);
    strings.insert(text.to_vec(), offset);
    Ok(())
}

/// Write a string field, as a pointer if the text was already written.
fn write_field(
    buffer: &mut Vec<u8>,
    strings: &mut AHashMap<Vec<u8>, u32>,
    text: &[u8],
) -> Result<(), BuildError> {
    if let Some(&target) = strings.get(text) {
        buffer.push(MODE_STRING_REDIRECT);
        put_u24_le(buffer, target);
        return Ok(());
    }
    pool_string(buffer, strings, text)
}
