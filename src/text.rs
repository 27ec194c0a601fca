//! Plain-text range dumps.
//!
//! One range per line:
//!
//! ```text
//! 1.0.0.0         1.0.0.255       澳大利亚 CZ88.NET
//! 1.0.1.0         1.0.3.255       中国 福建省
//! ```
//!
//! The country is a single whitespace-free token; everything after it is
//! the region. Blank lines and lines starting with `#` are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, Write};

use crate::address::parse_ipv4;
use crate::binary::DatabaseWriter;
use crate::database::Database;
use crate::error::{Error, Result};

static RANGE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3}(?:\.\d{1,3}){3})\s+(\d{1,3}(?:\.\d{1,3}){3})\s+(\S+)(?:\s+(.*))?$")
        .expect("range line pattern is valid")
});

/// One parsed line of a text dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    /// First address
    pub begin: u32,
    /// Last address (inclusive)
    pub end: u32,
    /// Country text
    pub country: String,
    /// Region text (may be empty)
    pub region: String,
}

/// Parse a single line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<TextRange>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let invalid = |reason: &str| Error::InvalidRangeLine {
        line: line_no,
        reason: reason.to_string(),
    };

    let caps = RANGE_LINE
        .captures(line)
        .ok_or_else(|| invalid("expected `begin end country [region]`"))?;

    let begin = parse_ipv4(&caps[1]).map_err(|e| invalid(&e.to_string()))?;
    let end = parse_ipv4(&caps[2]).map_err(|e| invalid(&e.to_string()))?;
    if end < begin {
        return Err(invalid("range end precedes begin"));
    }

    Ok(Some(TextRange {
        begin,
        end,
        country: caps[3].to_string(),
        region: caps.get(4).map_or("", |m| m.as_str()).trim().to_string(),
    }))
}

/// Parse every range in a text dump.
pub fn parse_ranges<R: BufRead>(reader: R) -> Result<Vec<TextRange>> {
    let mut ranges = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        if let Some(range) = parse_line(&line?, i + 1)? {
            ranges.push(range);
        }
    }
    Ok(ranges)
}

/// Build a database image from parsed ranges.
pub fn build_database(ranges: &[TextRange]) -> Result<Vec<u8>> {
    let mut writer = DatabaseWriter::new();
    for range in ranges {
        writer.add_range(range.begin, range.end, &range.country, &range.region)?;
    }
    Ok(writer.build()?)
}

/// Write every range of a database as text. Returns the number of lines.
///
/// Ranges with an empty or multi-word country do not parse back unchanged.
pub fn write_ranges<W: Write>(database: &Database, mut out: W) -> Result<usize> {
    let mut count = 0;
    for segment in database.segments() {
        let record = database.record(&segment);
        writeln!(
            out,
            "{:<15} {:<15} {} {}",
            segment.begin_addr(),
            segment.end_addr(),
            record.country,
            record.region
        )?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}
