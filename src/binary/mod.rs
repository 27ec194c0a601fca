//! QQWry-format range database.
//!
//! All integers are little-endian; pointers are 24-bit absolute offsets.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |      HEADER      |  8 bytes: index_begin (u32), index_end (u32)
//! +------------------+
//! |     RECORDS      |  ip_end (u32) + geo record, string pool
//! +------------------+
//! |   RANGE INDEX    |  [index_begin, index_end + 7): ip_begin (u32) + pointer (u24)
//! +------------------+
//! ```
//!
//! Each index pointer addresses the range's `ip_end`, immediately followed
//! by its geo record (see [`record`]).

mod format;
mod image;
mod index;
pub mod record;
pub mod writer;

#[cfg(test)]
mod tests;

pub use format::*;
pub use image::{DatabaseImage, IndexEntry};
pub use index::{resolve_entry, IndexStrategy, RangeIndex, Segment};
pub use record::{decode_record, GeoRecord};
pub use writer::DatabaseWriter;
