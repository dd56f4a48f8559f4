//! Transport strategies injected into a [`crate::connection::Connection`].
//!
//! A transport is split into a reading half and a writing half so the reader
//! and writer loops can run as independent tasks. The connection core never
//! depends on the concrete socket type: raw streams and WebSocket sessions
//! both reduce to [`TransportReader`] and [`TransportWriter`].

use std::{fmt, io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;

pub mod stream;
pub mod websocket;

pub use stream::{StreamReader, StreamWriter};
pub use websocket::{WebSocketReader, WebSocketWriter};

/// Outcome of a single transport read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Bytes to feed into the frame reassembler.
    Data(Bytes),
    /// Traffic that proves liveness but carries no payload.
    KeepAlive,
    /// The peer closed the transport.
    Eof,
}

/// Reading half of a transport.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Wait for the next chunk of inbound traffic.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the underlying socket fails.
    async fn read_chunk(&mut self) -> io::Result<Inbound>;
}

/// Writing half of a transport.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    /// Write one encoded frame to the peer.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the underlying socket fails.
    async fn write_frame(&mut self, frame: Bytes) -> io::Result<()>;

    /// Close the writing half.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the close handshake fails.
    async fn shutdown(&mut self) -> io::Result<()>;
}

/// Kind of transport carrying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Raw TCP stream.
    Tcp,
    /// WebSocket session after the HTTP upgrade.
    WebSocket,
    /// Any other byte stream attached by the caller.
    Stream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::WebSocket => "websocket",
            Self::Stream => "stream",
        })
    }
}

/// A connected transport ready to be handed to a connection.
pub struct Transport {
    pub(crate) kind: TransportKind,
    pub(crate) peer: Option<SocketAddr>,
    pub(crate) reader: Box<dyn TransportReader>,
    pub(crate) writer: Box<dyn TransportWriter>,
}

impl Transport {
    /// Assemble a transport from its halves.
    pub fn new(
        kind: TransportKind,
        peer: Option<SocketAddr>,
        reader: impl TransportReader,
        writer: impl TransportWriter,
    ) -> Self {
        Self {
            kind,
            peer,
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Kind of this transport.
    #[must_use]
    pub fn kind(&self) -> TransportKind { self.kind }

    /// Remote address, when known.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> { self.peer }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
