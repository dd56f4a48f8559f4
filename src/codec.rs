//! Pluggable message codecs.
//!
//! A codec turns one reassembled frame into a [`Message`] and back. It never
//! buffers: the [`crate::frame::FrameReassembler`] guarantees that every
//! frame handed to [`MessageCodec::decode`] is complete.
//!
//! The default [`LittleEndianCodec`] uses a fixed 8-byte header:
//!
//! ```text
//! +-------------+----------------+-----------------+
//! | event (u32) | body_size (u32)| body            |
//! |  LE         |  LE            | body_size bytes |
//! +-------------+----------------+-----------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    byte_order::{read_le_u32, write_le_u32},
    message::{HEADER_LEN, Message},
};

pub mod error;

pub use error::CodecError;

/// Encoder/decoder pair used by every connection of a server.
///
/// Implementations must be stateless with respect to individual frames so a
/// single instance can be shared across connections.
pub trait MessageCodec: Send + Sync + 'static {
    /// Encode `message` into the bytes of a single frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the message cannot be represented on the
    /// wire.
    fn encode(&self, message: &Message) -> Result<Bytes, CodecError>;

    /// Decode exactly one frame into a message.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the frame is malformed.
    fn decode(&self, frame: Bytes) -> Result<Message, CodecError>;
}

/// Default codec: little-endian `event` and `body_size` followed by the body.
///
/// # Examples
///
/// ```
/// use eventwire::{
///     codec::{LittleEndianCodec, MessageCodec},
///     message::Message,
/// };
///
/// let codec = LittleEndianCodec::default();
/// let bytes = codec.encode(&Message::new(1, "ab")).expect("encode");
/// assert_eq!(bytes.as_ref(), &[1, 0, 0, 0, 2, 0, 0, 0, b'a', b'b']);
/// assert_eq!(codec.decode(bytes).expect("decode"), Message::new(1, "ab"));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LittleEndianCodec {
    max_message_size: Option<usize>,
}

impl LittleEndianCodec {
    /// Create a codec rejecting bodies larger than `max_message_size` on
    /// decode. `None` disables the check.
    #[must_use]
    pub const fn new(max_message_size: Option<usize>) -> Self { Self { max_message_size } }

    /// Configured maximum body size.
    #[must_use]
    pub const fn max_message_size(&self) -> Option<usize> { self.max_message_size }
}

impl MessageCodec for LittleEndianCodec {
    fn encode(&self, message: &Message) -> Result<Bytes, CodecError> {
        let size = message.body_size();
        let size_field = u32::try_from(size).map_err(|_| CodecError::BodyTooLarge(size))?;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + size);
        buf.put_slice(&write_le_u32(message.event()));
        buf.put_slice(&write_le_u32(size_field));
        buf.put_slice(message.body());
        Ok(buf.freeze())
    }

    fn decode(&self, frame: Bytes) -> Result<Message, CodecError> {
        let Some((event, size)) = frame.get(..HEADER_LEN).map(|header| {
            let field = |at: usize| [header[at], header[at + 1], header[at + 2], header[at + 3]];
            (read_le_u32(field(0)), read_le_u32(field(4)))
        }) else {
            return Err(CodecError::HeaderTooShort {
                have: frame.len(),
                need: HEADER_LEN,
            });
        };

        let declared = size as usize;
        if let Some(max) = self.max_message_size.filter(|&max| declared > max) {
            return Err(CodecError::Oversized {
                size: declared,
                max,
            });
        }

        let actual = frame.len() - HEADER_LEN;
        if declared != actual {
            return Err(CodecError::SizeMismatch { declared, actual });
        }

        Ok(Message::new(event, frame.slice(HEADER_LEN..)))
    }
}

#[cfg(test)]
mod tests;
