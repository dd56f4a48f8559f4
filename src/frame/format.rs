//! Length field layout options.

use super::{conversion::is_supported_width, error::FrameConfigError};

/// Default upper bound on a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_LENGTH: u64 = 1 << 20;

/// Byte order used for decoding the length field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    #[default]
    Little,
}

/// Layout of the length field that delimits frames in a stream.
///
/// The total size of a frame is the decoded length field plus
/// `length_adjustment` plus the bytes up to the end of the length field.
/// `initial_bytes_to_strip` leading bytes are removed before the frame is
/// emitted.
///
/// The default layout reads a 4-byte little-endian length at offset 4, which
/// is exactly the `body_size` field of the message header: the decoder trusts
/// the message's own size field to split the stream.
///
/// # Examples
///
/// ```
/// use eventwire::frame::{Endianness, FrameConfig};
///
/// // A 2-byte big-endian length prefix that is stripped from the frame.
/// let config = FrameConfig {
///     byte_order: Endianness::Big,
///     length_field_offset: 0,
///     length_field_length: 2,
///     initial_bytes_to_strip: 2,
///     ..FrameConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// assert_eq!(config.length_field_end(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    /// Byte order of the length field.
    pub byte_order: Endianness,
    /// Largest total frame length accepted; longer frames are discarded.
    pub max_frame_length: u64,
    /// Offset of the length field from the start of the frame.
    pub length_field_offset: usize,
    /// Width of the length field in bytes (1, 2, 3, 4 or 8).
    pub length_field_length: usize,
    /// Value added to the decoded length to obtain the remaining frame size.
    pub length_adjustment: i64,
    /// Number of leading bytes removed from every emitted frame.
    pub initial_bytes_to_strip: usize,
    /// Report an oversized frame as soon as it is detected rather than after
    /// its bytes have been discarded.
    pub fail_fast: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            byte_order: Endianness::Little,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            length_field_offset: 4,
            length_field_length: 4,
            length_adjustment: 0,
            initial_bytes_to_strip: 0,
            fail_fast: false,
        }
    }
}

impl FrameConfig {
    /// Offset of the first byte following the length field.
    #[must_use]
    pub fn length_field_end(&self) -> usize {
        self.length_field_offset
            .saturating_add(self.length_field_length)
    }

    /// Check that the layout can be decoded.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameConfigError`] if the width is unsupported, the maximum
    /// frame length is zero, or the length field end overflows.
    pub fn validate(&self) -> Result<(), FrameConfigError> {
        if !is_supported_width(self.length_field_length) {
            return Err(FrameConfigError::UnsupportedWidth(self.length_field_length));
        }
        if self.max_frame_length == 0 {
            return Err(FrameConfigError::ZeroMaxFrameLength);
        }
        if self
            .length_field_offset
            .checked_add(self.length_field_length)
            .is_none()
        {
            return Err(FrameConfigError::OffsetOverflow {
                offset: self.length_field_offset,
            });
        }
        Ok(())
    }
}
