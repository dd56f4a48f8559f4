//! Helpers for explicit wire byte-order conversions.
//!
//! These helpers keep Clippy expectations scoped to the conversion points so
//! protocol code can remain explicit about wire endianness without repeating
//! lint annotations. The message header is little-endian; length fields may
//! use either order.

/// Serialise a `u32` in little-endian order.
///
/// # Examples
///
/// ```
/// use eventwire::byte_order::write_le_u32;
///
/// assert_eq!(write_le_u32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_le_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The message header is little-endian on the wire."
    )]
    value.to_le_bytes()
}

/// Parse a little-endian `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use eventwire::byte_order::read_le_u32;
///
/// assert_eq!(read_le_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_le_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The message header is little-endian on the wire."
    )]
    u32::from_le_bytes(bytes)
}

/// Parse a big-endian `u64` from an 8-byte buffer.
#[must_use]
pub fn read_be_u64(bytes: [u8; 8]) -> u64 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Length fields may be configured as big-endian."
    )]
    u64::from_be_bytes(bytes)
}

/// Parse a little-endian `u64` from an 8-byte buffer.
#[must_use]
pub fn read_le_u64(bytes: [u8; 8]) -> u64 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "Length fields may be configured as little-endian."
    )]
    u64::from_le_bytes(bytes)
}
