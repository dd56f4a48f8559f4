//! Conversion helpers for length field decoding.
use super::{error::FrameConfigError, format::Endianness};
use crate::byte_order::{read_be_u64, read_le_u64};

/// Widths, in bytes, a length field may occupy.
pub const SUPPORTED_WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];

/// Returns `true` when `width` is a supported length field width.
#[must_use]
pub fn is_supported_width(width: usize) -> bool { SUPPORTED_WIDTHS.contains(&width) }

/// Converts the first `width` bytes of `bytes` into a `u64` according to
/// `endianness`.
///
/// Widths of `1`, `2`, `3`, `4`, or `8` bytes are supported. The caller must
/// supply at least `width` bytes; the reassembler only calls this once the
/// whole length field is buffered.
///
/// # Errors
/// Returns [`FrameConfigError::UnsupportedWidth`] if `width` is not supported
/// and [`FrameConfigError::ShortLengthField`] if `bytes` is too short.
///
/// # Examples
///
/// ```
/// use eventwire::frame::{Endianness, bytes_to_u64};
///
/// assert_eq!(bytes_to_u64(&[0x01, 0x02, 0x03], 3, Endianness::Big), Ok(0x01_02_03));
/// assert_eq!(bytes_to_u64(&[0x01, 0x02, 0x03], 3, Endianness::Little), Ok(0x03_02_01));
/// ```
pub fn bytes_to_u64(bytes: &[u8], width: usize, endianness: Endianness) -> Result<u64, FrameConfigError> {
    if !is_supported_width(width) {
        return Err(FrameConfigError::UnsupportedWidth(width));
    }
    let Some(field) = bytes.get(..width) else {
        return Err(FrameConfigError::ShortLengthField {
            have: bytes.len(),
            need: width,
        });
    };

    let mut buf = [0u8; 8];
    let value = match endianness {
        Endianness::Big => {
            buf[8 - width..].copy_from_slice(field);
            read_be_u64(buf)
        }
        Endianness::Little => {
            buf[..width].copy_from_slice(field);
            read_le_u64(buf)
        }
    };
    Ok(value)
}
