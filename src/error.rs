//! Error types for k2geo.

use thiserror::Error;

/// Error type for k2geo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database load failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Malformed query
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Database build failure
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Database acquisition failure
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid line in a text range dump
    #[error("invalid range line {line}: {reason}")]
    InvalidRangeLine { line: usize, reason: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for k2geo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fixed-width reads at byte offsets.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The read would run past the end of the buffer
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },
}

/// Error type for loading a database image.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Buffer cannot hold the 8-byte header
    #[error("database too small: {0} bytes")]
    TooSmall(usize),

    /// Header index offsets are inconsistent with the buffer
    #[error("bad index range: begin={begin}, end={end}, size={size}")]
    BadIndexRange { begin: u32, end: u32, size: usize },

    /// An index entry points outside the buffer
    #[error("index entry {entry} points outside the database")]
    CorruptIndex { entry: usize },

    /// IO error while reading the database file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for lookup queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Input is not a dotted-quad IPv4 address
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddressFormat(String),
}

/// Error type for building a database image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// No ranges were added
    #[error("database must contain at least one range")]
    Empty,

    /// Range end precedes its begin
    #[error("range end {end:#010x} precedes begin {begin:#010x}")]
    InvertedRange { begin: u32, end: u32 },

    /// Range starts before the end of the previous one
    #[error("range begin {begin:#010x} does not follow previous end {previous_end:#010x}")]
    Unordered { begin: u32, previous_end: u32 },

    /// Text contains a NUL byte, which would end the stored string early
    #[error("text for range at {begin:#010x} contains a NUL byte: {text:?}")]
    InvalidText { begin: u32, text: String },

    /// An offset no longer fits the 24-bit pointer width
    #[error("database exceeds 24-bit offset space at {0} bytes")]
    TooLarge(usize),
}

/// Error type for the database acquisition pipeline.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// HTTP transport or status failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Control file is missing its magic or has unexpected fields
    #[error("malformed control header: {0}")]
    BadControlHeader(String),

    /// Payload size differs from the size declared in the control file
    #[error("payload size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Payload failed to inflate
    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    /// Decompressed payload is not a valid database
    #[error("downloaded database rejected: {0}")]
    Invalid(LoadError),

    /// Writing the output file failed
    #[error("failed to write database: {0}")]
    Write(std::io::Error),
}
