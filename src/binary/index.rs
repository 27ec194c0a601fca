//! Range index lookup strategies.
//!
//! Both strategies pick the last entry whose `ip_begin` does not exceed the
//! query and accept it only if the query is within `[begin, end]`.

use ipnet::Ipv4Subnets;
use std::net::Ipv4Addr;

use super::format::IP_END_SIZE;
use super::image::DatabaseImage;
use crate::error::LoadError;

/// How ranges are searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexStrategy {
    /// Binary search the packed index table on every query.
    #[default]
    OnDisk,
    /// Resolve every entry once at load time and search in memory.
    Materialized,
}

impl IndexStrategy {
    /// Strategy name for logs and display.
    pub fn name(&self) -> &'static str {
        match self {
            IndexStrategy::OnDisk => "on-disk",
            IndexStrategy::Materialized => "materialized",
        }
    }
}

/// A resolved range: inclusive bounds plus the offset of its geo record.
///
/// This is also the unit of the materialized index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// First address in the range
    pub begin: u32,
    /// Last address in the range (inclusive)
    pub end: u32,
    /// Absolute offset of the geo record (past the embedded `ip_end`)
    pub record_offset: u32,
}

impl Segment {
    /// Whether `ip` lies within `[begin, end]`.
    pub fn contains(&self, ip: u32) -> bool {
        self.begin <= ip && ip <= self.end
    }

    /// First address as an `Ipv4Addr`.
    pub fn begin_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.begin)
    }

    /// Last address as an `Ipv4Addr`.
    pub fn end_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Minimal set of CIDR blocks covering the range.
    ///
    /// Empty for an inverted range from a malformed file.
    pub fn subnets(&self) -> Ipv4Subnets {
        Ipv4Subnets::new(self.begin_addr(), self.end_addr(), 0)
    }
}

/// Resolve entry `i` of the image into a segment.
///
/// Returns `None` if the entry's record pointer lies outside the file.
pub fn resolve_entry(image: &DatabaseImage, i: usize) -> Option<Segment> {
    let entry = image.entry(i)?;
    let end = image.range_end(entry.record_pointer)?;
    Some(Segment {
        begin: entry.ip_begin,
        end,
        record_offset: entry.record_pointer + IP_END_SIZE as u32,
    })
}

/// Range index built over a database image.
#[derive(Debug)]
pub enum RangeIndex {
    /// Search the image directly.
    OnDisk,
    /// Pre-resolved segments in index order.
    Materialized(Vec<Segment>),
}

impl RangeIndex {
    /// Build the index for the given strategy.
    ///
    /// The materialized strategy reads every entry and fails with
    /// [`LoadError::CorruptIndex`] on the first one that cannot be resolved.
    pub fn build(image: &DatabaseImage, strategy: IndexStrategy) -> Result<Self, LoadError> {
        match strategy {
            IndexStrategy::OnDisk => Ok(RangeIndex::OnDisk),
            IndexStrategy::Materialized => {
                let count = image.entry_count();
                let mut segments = Vec::with_capacity(count);
                for i in 0..count {
                    let segment =
                        resolve_entry(image, i).ok_or(LoadError::CorruptIndex { entry: i })?;
                    segments.push(segment);
                }
                Ok(RangeIndex::Materialized(segments))
            }
        }
    }

    /// Strategy this index implements.
    pub fn strategy(&self) -> IndexStrategy {
        match self {
            RangeIndex::OnDisk => IndexStrategy::OnDisk,
            RangeIndex::Materialized(_) => IndexStrategy::Materialized,
        }
    }

    /// Find the segment containing `ip`.
    pub fn locate(&self, image: &DatabaseImage, ip: u32) -> Option<Segment> {
        match self {
            RangeIndex::OnDisk => locate_on_disk(image, ip),
            RangeIndex::Materialized(segments) => locate_materialized(segments, ip),
        }
    }

    /// Segment `i` in index order.
    pub fn segment(&self, image: &DatabaseImage, i: usize) -> Option<Segment> {
        match self {
            RangeIndex::OnDisk => resolve_entry(image, i),
            RangeIndex::Materialized(segments) => segments.get(i).copied(),
        }
    }
}

/// Binary search over the packed entries.
fn locate_on_disk(image: &DatabaseImage, ip: u32) -> Option<Segment> {
    // Invariant: begin[l] <= ip (or l == 0), and r == N or begin[r] > ip.
    let mut l = 0;
    let mut r = image.entry_count();
    while r - l > 1 {
        let m = (l + r) / 2;
        if ip < image.entry_begin(m)? {
            r = m;
        } else {
            l = m;
        }
    }

    let segment = resolve_entry(image, l)?;
    segment.contains(ip).then_some(segment)
}

/// Binary search over the materialized segments.
fn locate_materialized(segments: &[Segment], ip: u32) -> Option<Segment> {
    let posi = segments.partition_point(|s| s.begin <= ip);
    let segment = *segments.get(posi.checked_sub(1)?)?;
    (ip <= segment.end).then_some(segment)
}
