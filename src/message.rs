//! Application messages carried inside frames.
//!
//! A [`Message`] pairs a numeric event identifier with an opaque body. On the
//! wire it is an 8-byte little-endian header (`event`, `body_size`) followed by
//! the body; see [`crate::codec`].

use bytes::Bytes;

/// Size of the fixed message header in bytes.
pub const HEADER_LEN: usize = 8;

/// Reserved response event for requests with no registered route.
pub const NOT_FOUND: u32 = 404;

/// Body sent with [`NOT_FOUND`].
pub const NOT_FOUND_BODY: &str = "Event Not Found";

/// Reserved response event for handler failures caught by recovery.
pub const SERVER_ERROR: u32 = 500;

/// Body sent with [`SERVER_ERROR`].
pub const SERVER_ERROR_BODY: &str = "Server Error";

/// Decoded `{event, body}` unit.
///
/// The body size is always derived from the body itself, so a message can
/// never disagree with its own header.
///
/// # Examples
///
/// ```
/// use eventwire::message::Message;
///
/// let msg = Message::new(1, "ab");
/// assert_eq!(msg.event(), 1);
/// assert_eq!(msg.body_size(), 2);
/// assert_eq!(msg.body().as_ref(), b"ab");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Message {
    event: u32,
    body: Bytes,
}

impl Message {
    /// Create a message for `event` carrying `body`.
    pub fn new(event: u32, body: impl Into<Bytes>) -> Self {
        Self {
            event,
            body: body.into(),
        }
    }

    /// Event identifier.
    #[must_use]
    pub fn event(&self) -> u32 { self.event }

    /// Message body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// Length of the body in bytes.
    #[must_use]
    pub fn body_size(&self) -> usize { self.body.len() }

    /// Consume the message, returning its body.
    #[must_use]
    pub fn into_body(self) -> Bytes { self.body }

    /// The reserved "not found" response.
    #[must_use]
    pub fn not_found() -> Self { Self::new(NOT_FOUND, NOT_FOUND_BODY) }

    /// The reserved "server error" response.
    #[must_use]
    pub fn server_error() -> Self { Self::new(SERVER_ERROR, SERVER_ERROR_BODY) }
}
