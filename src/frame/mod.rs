//! Stream framing: turning arbitrarily chunked bytes into whole frames.
//!
//! A frame is delimited by a length field at a configurable offset. The
//! [`FrameReassembler`] buffers partial reads and emits every complete frame
//! as soon as its last byte arrives, so the message codec never observes a
//! partial message.

pub mod conversion;
pub mod error;
pub mod format;
pub mod reassembler;

pub use conversion::bytes_to_u64;
pub use error::{FrameConfigError, FramingError};
pub use format::{DEFAULT_MAX_FRAME_LENGTH, Endianness, FrameConfig};
pub use reassembler::{Feed, FrameReassembler};
