//! Error types for frame configuration and stream reassembly.

use thiserror::Error;

/// Problems detected while validating a [`super::FrameConfig`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FrameConfigError {
    /// The length field width is not one of 1, 2, 3, 4 or 8 bytes.
    #[error("unsupported length field width {0} (expected 1, 2, 3, 4, or 8)")]
    UnsupportedWidth(usize),
    /// Fewer bytes than the length field width were supplied for decoding.
    #[error("length field needs {need} bytes, have {have}")]
    ShortLengthField {
        /// Bytes supplied.
        have: usize,
        /// Width of the length field.
        need: usize,
    },
    /// `max_frame_length` was zero.
    #[error("max frame length must be greater than zero")]
    ZeroMaxFrameLength,
    /// `length_field_offset + length_field_length` overflowed.
    #[error("length field offset {offset} overflows")]
    OffsetOverflow {
        /// Configured offset.
        offset: usize,
    },
}

/// Failures raised while reassembling frames from a byte stream.
///
/// Only [`FramingError::FrameTooLong`] is recoverable: the offending bytes are
/// discarded and decoding resumes with the next frame. Every other variant
/// means the stream can no longer be trusted and the connection should close.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A frame declared a length above the configured maximum and was
    /// discarded.
    #[error("adjusted frame length exceeds {max}: {length} - discarded")]
    FrameTooLong {
        /// Total frame length derived from the length field.
        length: u64,
        /// Configured maximum frame length.
        max: u64,
    },
    /// An 8-byte length field decoded to a negative value.
    #[error("negative pre-adjustment length field: {0}")]
    NegativeLength(i64),
    /// The adjusted frame length does not even cover the length field.
    #[error("adjusted frame length ({length}) is less than length field end offset: {header}")]
    LengthBelowHeader {
        /// Adjusted frame length.
        length: i128,
        /// Offset of the first byte after the length field.
        header: usize,
    },
    /// More header bytes were configured for stripping than the frame holds.
    #[error("adjusted frame length ({length}) is less than initial bytes to strip: {strip}")]
    StripExceedsFrame {
        /// Adjusted frame length.
        length: usize,
        /// Configured number of bytes to strip.
        strip: usize,
    },
    /// The length field could not be decoded.
    #[error(transparent)]
    Config(#[from] FrameConfigError),
}

impl FramingError {
    /// Returns `true` if decoding may continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool { matches!(self, Self::FrameTooLong { .. }) }
}
