//! Stateful length-field frame decoder.

use bytes::{Buf, Bytes, BytesMut};

use super::{
    conversion::bytes_to_u64,
    error::{FrameConfigError, FramingError},
    format::FrameConfig,
};

/// Result of feeding one chunk of bytes into a [`FrameReassembler`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Feed {
    /// Complete frame payloads in stream order.
    pub frames: Vec<Bytes>,
    /// Oversized frames that were discarded while processing the chunk.
    pub discarded: Vec<FramingError>,
    /// Non-recoverable error that stopped decoding. `frames` still holds
    /// every frame completed before it.
    pub fatal: Option<FramingError>,
}

impl Feed {
    /// Returns `true` if the stream can no longer be decoded.
    #[must_use]
    pub fn is_fatal(&self) -> bool { self.fatal.is_some() }

    /// Reject the whole feed when decoding stopped on a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the fatal [`FramingError`], dropping any frames completed
    /// before it.
    pub fn into_result(self) -> Result<Self, FramingError> {
        match self.fatal {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Splits a byte stream into whole frames using a configurable length field.
///
/// Bytes are accumulated across calls to [`feed`](Self::feed). Each call
/// drains every complete frame currently buffered and keeps any trailing
/// partial frame for the next call, so the same stream produces the same
/// frames however it is chunked.
///
/// Frames longer than [`FrameConfig::max_frame_length`] are never emitted:
/// their bytes are discarded, even when they arrive over several calls, and
/// a [`FramingError::FrameTooLong`] is reported in [`Feed::discarded`].
///
/// # Examples
///
/// ```
/// use eventwire::frame::{FrameConfig, FrameReassembler};
///
/// let mut reassembler = FrameReassembler::new(FrameConfig::default()).expect("valid config");
/// let frame = [1, 0, 0, 0, 2, 0, 0, 0, b'a', b'b'];
///
/// assert!(reassembler.feed(&frame[..5]).frames.is_empty());
/// let feed = reassembler.feed(&frame[5..]);
/// assert_eq!(feed.frames, vec![frame.to_vec()]);
/// ```
#[derive(Clone, Debug)]
pub struct FrameReassembler {
    config: FrameConfig,
    length_field_end: usize,
    buffer: BytesMut,
    discarding: bool,
    too_long_frame_length: u64,
    bytes_to_discard: u64,
}

impl FrameReassembler {
    /// Create a reassembler for the given layout.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameConfigError`] if `config` fails validation.
    pub fn new(config: FrameConfig) -> Result<Self, FrameConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            length_field_end: config.length_field_end(),
            buffer: BytesMut::new(),
            discarding: false,
            too_long_frame_length: 0,
            bytes_to_discard: 0,
        })
    }

    /// Layout used by this reassembler.
    #[must_use]
    pub fn config(&self) -> &FrameConfig { &self.config }

    /// Number of bytes buffered but not yet emitted.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// Returns `true` while the remainder of an oversized frame is being
    /// skipped.
    #[must_use]
    pub fn is_discarding(&self) -> bool { self.discarding }

    /// Append `chunk` to the buffer and drain every complete frame.
    ///
    /// A malformed stream (negative length, adjusted length shorter than the
    /// header, or more bytes to strip than the frame holds) stops decoding and
    /// is reported in [`Feed::fatal`]. Frames completed before the malformed
    /// one are still returned, so the result does not depend on how the
    /// stream was chunked.
    pub fn feed(&mut self, chunk: &[u8]) -> Feed {
        self.buffer.extend_from_slice(chunk);
        let mut feed = Feed::default();
        loop {
            match self.decode_next() {
                Ok(Some(frame)) => feed.frames.push(frame),
                Ok(None) => return feed,
                Err(err) if err.is_recoverable() => feed.discarded.push(err),
                Err(err) => {
                    feed.fatal = Some(err);
                    return feed;
                }
            }
        }
    }

    /// Decode a single frame from the buffer if one is complete.
    fn decode_next(&mut self) -> Result<Option<Bytes>, FramingError> {
        if self.discarding {
            self.discard_buffered()?;
        }

        if self.buffer.len() < self.length_field_end {
            return Ok(None);
        }

        let declared = self.read_length_field()?;
        let frame_length = i128::from(declared)
            + i128::from(self.config.length_adjustment)
            + self.length_field_end as i128;

        if frame_length < self.length_field_end as i128 {
            self.buffer.advance(self.length_field_end);
            return Err(FramingError::LengthBelowHeader {
                length: frame_length,
                header: self.length_field_end,
            });
        }

        let max = i128::from(self.config.max_frame_length);
        if frame_length > max {
            let length = u64::try_from(frame_length).unwrap_or(u64::MAX);
            self.exceeded_frame_length(length)?;
            return Ok(None);
        }

        // Bounded by `max_frame_length`, which fits in `u64`.
        let Ok(frame_length) = usize::try_from(frame_length) else {
            return Err(self.too_long(u64::try_from(frame_length).unwrap_or(u64::MAX)));
        };

        if self.buffer.len() < frame_length {
            return Ok(None);
        }

        let strip = self.config.initial_bytes_to_strip;
        if strip > frame_length {
            self.buffer.advance(frame_length);
            return Err(FramingError::StripExceedsFrame {
                length: frame_length,
                strip,
            });
        }

        self.buffer.advance(strip);
        Ok(Some(self.buffer.split_to(frame_length - strip).freeze()))
    }

    #[expect(
        clippy::cast_possible_wrap,
        reason = "an 8-byte length field carries a signed 64-bit value"
    )]
    fn read_length_field(&mut self) -> Result<i64, FramingError> {
        let start = self.config.length_field_offset;
        let raw = bytes_to_u64(
            &self.buffer[start..self.length_field_end],
            self.config.length_field_length,
            self.config.byte_order,
        )?;
        let value = raw as i64;
        if value < 0 {
            self.buffer.advance(self.length_field_end);
            return Err(FramingError::NegativeLength(value));
        }
        Ok(value)
    }

    /// Skip the oversized frame starting at the head of the buffer.
    fn exceeded_frame_length(&mut self, frame_length: u64) -> Result<(), FramingError> {
        self.too_long_frame_length = frame_length;
        let buffered = self.buffer.len() as u64;
        if frame_length <= buffered {
            // Whole frame is already buffered; drop exactly its bytes.
            self.buffer.advance(frame_length as usize);
        } else {
            self.discarding = true;
            self.bytes_to_discard = frame_length - buffered;
            self.buffer.clear();
        }
        self.fail_if_necessary(true)
    }

    fn discard_buffered(&mut self) -> Result<(), FramingError> {
        let available = self.buffer.len() as u64;
        let skip = self.bytes_to_discard.min(available);
        // `skip` never exceeds the buffered length.
        self.buffer.advance(skip as usize);
        self.bytes_to_discard -= skip;
        self.fail_if_necessary(false)
    }

    fn fail_if_necessary(&mut self, first_detection: bool) -> Result<(), FramingError> {
        if self.bytes_to_discard == 0 {
            let length = std::mem::take(&mut self.too_long_frame_length);
            self.discarding = false;
            if !self.config.fail_fast || first_detection {
                return Err(self.too_long(length));
            }
            return Ok(());
        }

        if self.config.fail_fast && first_detection {
            return Err(self.too_long(self.too_long_frame_length));
        }
        Ok(())
    }

    fn too_long(&self, length: u64) -> FramingError {
        FramingError::FrameTooLong {
            length,
            max: self.config.max_frame_length,
        }
    }
}
