//! Dotted-quad IPv4 address parsing.

use std::net::Ipv4Addr;

use crate::error::QueryError;

/// Parse a dotted-quad IPv4 address into its numeric form.
///
/// Surrounding whitespace is ignored. The address must have exactly four
/// groups of one to three decimal digits, each no greater than 255.
/// Leading zeros are read as decimal, so `"010.0.0.1"` is `10.0.0.1`.
pub fn parse_ipv4(input: &str) -> Result<u32, QueryError> {
    let invalid = || QueryError::InvalidAddressFormat(input.to_string());

    let mut value: u32 = 0;
    let mut groups = 0;
    for group in input.trim().split('.') {
        groups += 1;
        if groups > 4 || group.is_empty() || group.len() > 3 {
            return Err(invalid());
        }
        if !group.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let octet: u32 = group.parse().map_err(|_| invalid())?;
        if octet > 255 {
            return Err(invalid());
        }
        value = (value << 8) | octet;
    }

    if groups != 4 {
        return Err(invalid());
    }
    Ok(value)
}

/// Parse a dotted-quad IPv4 address into an [`Ipv4Addr`].
pub fn parse_addr(input: &str) -> Result<Ipv4Addr, QueryError> {
    parse_ipv4(input).map(Ipv4Addr::from)
}
