//! K2Geo - IPv4 geolocation over QQWry-format range databases.
//!
//! This crate loads a QQWry-format database (a sorted table of IPv4 ranges,
//! each pointing at a country and region string pair) and answers
//! "which range contains this address" queries.
//!
//! # Features
//!
//! - **Two index strategies**: binary search directly over the file, or a
//!   materialized segment table built at load time
//! - **Memory-mapped loading**: large files are mapped, not read
//! - **GB18030 decoding**: record text is transcoded to UTF-8
//! - **LRU query cache**: repeated queries skip parsing and search
//! - **Hot reload**: replace the database without blocking readers
//! - **Builder and text dumps**: write databases from ranges and back
//! - **Updates**: download, unpack, and install new releases
//!
//! # Quick Start
//!
//! ```ignore
//! use k2geo::GeoReader;
//! use std::path::Path;
//!
//! let reader = GeoReader::open(Path::new("qqwry.dat"))?;
//!
//! match reader.lookup("8.8.8.8")? {
//!     Some(record) => println!("{} {}", record.country, record.region),
//!     None => println!("not covered"),
//! }
//! ```
//!
//! # Lookup Semantics
//!
//! A query resolves to the range with the greatest begin address not
//! above it, and hits only if the address is also within that range's end.
//! Addresses in gaps between ranges, or before the first range, miss.
//! Malformed addresses are an error, distinct from a miss.
//!
//! # Updates
//!
//! ```ignore
//! use k2geo::{GeoReader, Updater};
//!
//! let reader = GeoReader::new();
//! let updater = Updater::new("/var/lib/k2geo/qqwry.dat");
//!
//! // Downloads, verifies, installs atomically, then hot-reloads
//! if updater.needs_update() {
//!     updater.update_into(&reader)?;
//! }
//! ```

mod error;

pub mod address;
pub mod binary;
pub mod cache;
pub mod database;
pub mod metadata;
pub mod reader;
pub mod text;
pub mod update;

// Re-export core types
pub use error::{BuildError, CodecError, Error, LoadError, QueryError, Result, UpdateError};

pub use address::parse_ipv4;
pub use binary::{GeoRecord, IndexStrategy, Segment};
pub use cache::{CacheConfig, CacheStats, LookupCache};
pub use database::Database;
pub use reader::{GeoReader, ReaderConfig};

// Re-export update management
pub use metadata::UpdateMetadata;
pub use update::{UpdateConfig, Updater};
