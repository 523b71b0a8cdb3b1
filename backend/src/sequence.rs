//! Pure arithmetic for the two identifier spaces handed out by the issuer.
//!
//! The serial space is per serial prefix: a serial is the prefix followed by
//! a zero-padded decimal counter, and every model or region that ends up with
//! the same prefix shares one counter. The MAC space is global: a 48-bit
//! unsigned integer rendered as six colon-separated hex octets.
//!
//! Nothing here touches storage. Every function derives the next value from
//! the last *committed* value.
//!
//! MAC arithmetic never wraps. Any computation that would leave the 48-bit
//! space is rejected with [`SequenceError::MacSpaceExhausted`].

use thiserror::Error;

/// Highest value a MAC address can take.
pub const MAC_MAX: u64 = 0xFFFF_FFFF_FFFF;

/// Number of hex digits in the stored counter form (`0C7FEDB00000`).
pub const MAC_HEX_WIDTH: usize = 12;

/// Minimum width of the decimal counter appended to a serial prefix.
pub const SERIAL_COUNTER_WIDTH: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Invalid MAC counter value '{0}': expected 1 to 12 hex digits")]
    InvalidHex(String),
    #[error("MAC address space exhausted: cannot advance {last} by {requested}")]
    MacSpaceExhausted { last: String, requested: u64 },
}

/// Parses the stored counter form of a MAC address.
pub fn parse_mac_hex(value: &str) -> Result<u64, SequenceError> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAC_HEX_WIDTH
        || !trimmed.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(SequenceError::InvalidHex(value.to_string()));
    }
    u64::from_str_radix(trimmed, 16).map_err(|_| SequenceError::InvalidHex(value.to_string()))
}

/// Renders a MAC value in the stored counter form: 12 uppercase hex digits.
pub fn format_mac_hex(value: u64) -> String {
    format!("{value:0width$X}", width = MAC_HEX_WIDTH)
}

/// Renders a MAC value as `AA:BB:CC:DD:EE:FF`.
pub fn format_mac_address(value: u64) -> String {
    (0..6)
        .rev()
        .map(|octet| format!("{:02X}", (value >> (octet * 8)) & 0xFF))
        .collect::<Vec<_>>()
        .join(":")
}

fn checked_advance(last_mac_hex: &str, last: u64, steps: u64) -> Result<u64, SequenceError> {
    last.checked_add(steps)
        .filter(|next| *next <= MAC_MAX)
        .ok_or_else(|| SequenceError::MacSpaceExhausted {
            last: last_mac_hex.to_string(),
            requested: steps,
        })
}

/// Returns the MAC address `offset + 1` steps after `last_mac_hex`.
///
/// Offset 0 yields the address immediately following the last issued one.
pub fn next_mac(last_mac_hex: &str, offset: u64) -> Result<String, SequenceError> {
    let last = parse_mac_hex(last_mac_hex)?;
    let steps = offset
        .checked_add(1)
        .ok_or_else(|| SequenceError::MacSpaceExhausted {
            last: last_mac_hex.to_string(),
            requested: offset,
        })?;
    checked_advance(last_mac_hex, last, steps).map(format_mac_address)
}

/// Returns the new counter value after `consumed` addresses were handed out.
pub fn advance_mac_hex(last_mac_hex: &str, consumed: u64) -> Result<String, SequenceError> {
    let last = parse_mac_hex(last_mac_hex)?;
    checked_advance(last_mac_hex, last, consumed).map(format_mac_hex)
}

fn parse_counter(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Numeric counter of `serial` when it was issued under `prefix`.
pub fn serial_counter(serial: &str, prefix: &str) -> Option<u64> {
    serial.strip_prefix(prefix).and_then(parse_counter)
}

/// Renders the serial with counter `counter` under `prefix`.
pub fn format_serial(prefix: &str, counter: u64) -> String {
    format!("{prefix}{counter:0width$}", width = SERIAL_COUNTER_WIDTH)
}

/// Computes the `index`-th serial of a batch under `prefix`, counting on
/// from `start`, the highest counter already issued under that prefix.
pub fn next_serial(start: u64, prefix: &str, index: u64) -> String {
    format_serial(prefix, start.saturating_add(index).saturating_add(1))
}

/// Strips everything but ASCII letters and digits.
pub fn clean_prefix(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Builds the serial-numbering prefix: cleaned prefix, region, year tag.
pub fn serial_prefix(clean_prefix: &str, region_id: &str, year_tag: &str) -> String {
    format!("{clean_prefix}{region_id}{year_tag}")
}
