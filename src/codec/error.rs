//! Error types for the message codec.

use thiserror::Error;

/// Failures encoding or decoding a [`crate::message::Message`].
///
/// Decode failures affect a single frame only: the connection logs and drops
/// the frame, then carries on with the next one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The frame is shorter than the fixed message header.
    #[error("message header needs {need} bytes, have {have}")]
    HeaderTooShort {
        /// Bytes available.
        have: usize,
        /// Header length.
        need: usize,
    },

    /// The declared body size disagrees with the bytes in the frame.
    #[error("declared body size {declared} does not match {actual} available bytes")]
    SizeMismatch {
        /// Body size from the header.
        declared: usize,
        /// Bytes following the header.
        actual: usize,
    },

    /// The declared body size exceeds the configured maximum.
    #[error("message body of {size} bytes exceeds maximum of {max}")]
    Oversized {
        /// Body size from the header.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The body cannot be described by a 32-bit size field.
    #[error("message body of {0} bytes does not fit the 32-bit size field")]
    BodyTooLarge(usize),
}
