//! Wire-level builders and chunking helpers.
//!
//! The reassembler must emit the same frames however a stream is split, so
//! tests commonly encode a batch of messages and replay it in arbitrary
//! pieces.

use bytes::Bytes;
use eventwire::{LittleEndianCodec, Message, MessageCodec};

/// Encode a single message with the default codec.
///
/// # Panics
///
/// Panics if the message cannot be encoded, which only happens for bodies
/// larger than `u32::MAX` bytes.
#[must_use]
pub fn encode_message(event: u32, body: impl Into<Bytes>) -> Vec<u8> {
    LittleEndianCodec::default()
        .encode(&Message::new(event, body))
        .expect("message encodes")
        .to_vec()
}

/// Encode `messages` back to back into one contiguous stream.
///
/// ```rust
/// use eventwire::Message;
/// use eventwire_testing::encode_messages;
///
/// let stream = encode_messages(&[Message::new(1, "a"), Message::new(2, "")]);
/// assert_eq!(stream.len(), 9 + 8);
/// ```
#[must_use]
pub fn encode_messages(messages: &[Message]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| encode_message(m.event(), m.body().clone()))
        .collect()
}

/// Split `bytes` into pieces of at most `size` bytes.
///
/// A `size` of zero is treated as one.
#[must_use]
pub fn chunks_of(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Split `bytes` at each offset in `cuts`.
///
/// Offsets are sorted, deduplicated and clamped to the input length, so any
/// vector of indices yields a valid partition. Empty pieces are dropped.
#[must_use]
pub fn chunk_at(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(bytes.len())).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
        if cut > start {
            pieces.push(bytes[start..cut].to_vec());
            start = cut;
        }
    }
    pieces
}
