//! Database image: the raw buffer plus its validated header.

use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use super::format::*;
use crate::error::LoadError;

/// Backing storage for a database image.
enum Storage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Storage::Owned(data) => data,
            Storage::Mapped(mmap) => mmap,
        }
    }
}

/// One packed range index entry as stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// First address of the range
    pub ip_begin: u32,
    /// Absolute offset of the range's `ip_end` field
    pub record_pointer: u32,
}

/// Immutable database buffer with a structurally valid header.
///
/// Only the header and index bounds are checked. Garbage inside the
/// index or the record area is tolerated and surfaces as misses or
/// odd strings at lookup time.
pub struct DatabaseImage {
    data: Storage,
    index_begin: u32,
    index_end: u32,
    entry_count: usize,
}

impl DatabaseImage {
    /// Load an image from an owned buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, LoadError> {
        let (index_begin, index_end) = Self::validate(&data)?;
        Ok(Self::new(Storage::Owned(data), index_begin, index_end))
    }

    /// Open a database file by memory-mapping it.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        // The mapping is read-only and the file is treated as immutable while loaded.
        let mmap = unsafe { Mmap::map(&file)? };
        let (index_begin, index_end) = Self::validate(&mmap)?;
        Ok(Self::new(Storage::Mapped(mmap), index_begin, index_end))
    }

    fn new(data: Storage, index_begin: u32, index_end: u32) -> Self {
        let entry_count = (index_end - index_begin) as usize / INDEX_ENTRY_SIZE + 1;
        Self {
            data,
            index_begin,
            index_end,
            entry_count,
        }
    }

    /// Check the structural invariants of a database buffer.
    ///
    /// Returns `(index_begin, index_end)` on success.
    pub fn validate(data: &[u8]) -> Result<(u32, u32), LoadError> {
        if data.len() < HEADER_SIZE {
            return Err(LoadError::TooSmall(data.len()));
        }

        let begin = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let end = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        let span_ok = begin <= end && (end - begin) as usize % INDEX_ENTRY_SIZE == 0;
        let fits = (end as u64) + INDEX_ENTRY_SIZE as u64 <= data.len() as u64;
        if !span_ok || !fits {
            return Err(LoadError::BadIndexRange {
                begin,
                end,
                size: data.len(),
            });
        }

        Ok((begin, end))
    }

    /// Raw bytes of the whole file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the file in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: a valid image holds at least the header and one entry.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the image is backed by a memory-mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.data, Storage::Mapped(_))
    }

    /// Absolute offset of the first index entry.
    pub fn index_begin(&self) -> u32 {
        self.index_begin
    }

    /// Absolute offset of the last index entry.
    pub fn index_end(&self) -> u32 {
        self.index_end
    }

    /// Number of range entries in the index.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    fn entry_offset(&self, i: usize) -> usize {
        self.index_begin as usize + i * INDEX_ENTRY_SIZE
    }

    /// `ip_begin` of entry `i`.
    pub fn entry_begin(&self, i: usize) -> Option<u32> {
        if i >= self.entry_count {
            return None;
        }
        read_u32_le(&self.data, self.entry_offset(i)).ok()
    }

    /// Entry `i` of the index.
    pub fn entry(&self, i: usize) -> Option<IndexEntry> {
        if i >= self.entry_count {
            return None;
        }
        let offset = self.entry_offset(i);
        Some(IndexEntry {
            ip_begin: read_u32_le(&self.data, offset).ok()?,
            record_pointer: read_u24_le(&self.data, offset + 4).ok()?,
        })
    }

    /// `ip_end` stored at a record pointer.
    ///
    /// Returns `None` if the pointer lies outside the file.
    pub fn range_end(&self, record_pointer: u32) -> Option<u32> {
        read_u32_le(&self.data, record_pointer as usize).ok()
    }
}

impl std::fmt::Debug for DatabaseImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseImage")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .field("index_begin", &self.index_begin)
            .field("index_end", &self.index_end)
            .field("entry_count", &self.entry_count)
            .finish()
    }
}
