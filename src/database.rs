//! Loaded database snapshot.

use std::net::Ipv4Addr;
use std::path::Path;

use crate::address::parse_ipv4;
use crate::binary::{decode_record, DatabaseImage, GeoRecord, IndexStrategy, RangeIndex, Segment};
use crate::error::{LoadError, QueryError};

/// An immutable, loaded range database.
///
/// A `Database` is built once and never mutated, so it can be shared
/// across threads without synchronization. Reloading means building a new
/// one (see [`GeoReader`](crate::GeoReader)).
///
/// # Example
///
/// ```
/// use k2geo::binary::DatabaseWriter;
/// use k2geo::{Database, GeoRecord, IndexStrategy};
///
/// let mut writer = DatabaseWriter::new();
/// writer.add_range(0x08080800, 0x080808FF, "US", "CA").unwrap();
/// let db = Database::from_bytes(writer.build().unwrap(), IndexStrategy::OnDisk).unwrap();
///
/// assert_eq!(db.lookup("8.8.8.8").unwrap(), Some(GeoRecord::new("US", "CA")));
/// assert_eq!(db.lookup("8.8.9.1").unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Database {
    image: DatabaseImage,
    index: RangeIndex,
}

impl Database {
    /// Load a database from an owned buffer.
    pub fn from_bytes(data: Vec<u8>, strategy: IndexStrategy) -> Result<Self, LoadError> {
        Self::from_image(DatabaseImage::from_bytes(data)?, strategy)
    }

    /// Load a database file.
    pub fn open(path: &Path, strategy: IndexStrategy) -> Result<Self, LoadError> {
        Self::from_image(DatabaseImage::open(path)?, strategy)
    }

    /// Build the index for an already validated image.
    pub fn from_image(image: DatabaseImage, strategy: IndexStrategy) -> Result<Self, LoadError> {
        let index = RangeIndex::build(&image, strategy)?;
        log::debug!(
            "Loaded database: {} bytes, {} segments, {} index",
            image.len(),
            image.entry_count(),
            strategy.name()
        );
        Ok(Self { image, index })
    }

    /// The underlying image.
    pub fn image(&self) -> &DatabaseImage {
        &self.image
    }

    /// Index strategy in use.
    pub fn strategy(&self) -> IndexStrategy {
        self.index.strategy()
    }

    /// Number of ranges in the index.
    pub fn segment_count(&self) -> usize {
        self.image.entry_count()
    }

    /// Find the range containing `ip`.
    pub fn locate(&self, ip: u32) -> Option<Segment> {
        self.index.locate(&self.image, ip)
    }

    /// Decode the geo record of a range.
    pub fn record(&self, segment: &Segment) -> GeoRecord {
        decode_record(self.image.as_bytes(), segment.record_offset as usize)
    }

    /// Look up a numeric address.
    pub fn lookup_u32(&self, ip: u32) -> Option<GeoRecord> {
        self.locate(ip).map(|segment| self.record(&segment))
    }

    /// Look up an address.
    pub fn lookup_ip(&self, ip: Ipv4Addr) -> Option<GeoRecord> {
        self.lookup_u32(u32::from(ip))
    }

    /// Look up a dotted-quad address string.
    ///
    /// Returns `Ok(None)` when the address is well formed but not covered
    /// by any range.
    pub fn lookup(&self, address: &str) -> Result<Option<GeoRecord>, QueryError> {
        Ok(self.lookup_u32(parse_ipv4(address)?))
    }

    /// Record of the final range, conventionally the data version marker.
    pub fn last_entry(&self) -> Option<GeoRecord> {
        let last = self.segment_count().checked_sub(1)?;
        self.index
            .segment(&self.image, last)
            .map(|segment| self.record(&segment))
    }

    /// Iterate over all resolvable ranges in index order.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.segment_count()).filter_map(move |i| self.index.segment(&self.image, i))
    }
}
