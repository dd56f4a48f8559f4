//! Metric helpers for `eventwire`.
//!
//! This module defines metric names and small helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking registered connections.
pub const CONNECTIONS_ACTIVE: &str = "eventwire_connections_active";
/// Name of the counter tracking frames read and written.
pub const FRAMES_TOTAL: &str = "eventwire_frames_total";
/// Name of the counter tracking errors by kind.
pub const ERRORS_TOTAL: &str = "eventwire_errors_total";
/// Name of the counter tracking connections refused by admission control.
pub const CONNECTIONS_REJECTED: &str = "eventwire_connections_rejected_total";
/// Name of the counter tracking panics raised by handler chains.
pub const HANDLER_PANICS: &str = "eventwire_handler_panics_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received from a peer.
    Inbound,
    /// Frames written to a peer.
    Outbound,
}

impl Direction {
    /// Label value used for this direction.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Category of a recorded error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An oversized frame was discarded.
    FrameTooLong,
    /// The byte stream was malformed and the connection closed.
    Framing,
    /// A frame could not be decoded into a message.
    Decode,
    /// Reading from or writing to the transport failed.
    Transport,
}

impl ErrorKind {
    /// Label value used for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FrameTooLong => "frame_too_long",
            ErrorKind::Framing => "framing",
            ErrorKind::Decode => "decode",
            ErrorKind::Transport => "transport",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error occurrence.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a connection refused at accept time.
pub fn inc_rejected() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_REJECTED).increment(1);
}

/// Record a panic raised by a handler chain.
pub fn inc_handler_panics() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_PANICS).increment(1);
}
