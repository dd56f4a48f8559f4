//! Connection core shared by every transport.
//!
//! A [`Connection`] owns the outbound queue, liveness timestamp and close
//! state of one peer. Transport specifics are injected as
//! [`crate::transport::TransportReader`]/[`crate::transport::TransportWriter`]
//! halves, so reassembly, decoding and worker dispatch are identical for TCP
//! and WebSocket peers.
//!
//! Three tasks run per connection: a reader feeding the reassembler and the
//! worker, a writer draining the outbound queue, and a heartbeat monitor.
//! They share a cancellation token that [`Connection::close`] cancels exactly
//! once.

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use thiserror::Error;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{CodecError, MessageCodec},
    message::Message,
    registry::ConnectionRegistry,
    transport::TransportKind,
    worker::WorkerBinding,
};

mod io;
mod lifecycle;
#[cfg(test)]
pub(crate) mod test_support;

pub(crate) use lifecycle::ConnectionIo;

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Errors returned when queueing an outbound message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is closed or closed while waiting.
    #[error("connection is closed")]
    Closed,
    /// The outbound queue is full (non-blocking send only).
    #[error("outbound queue is full")]
    QueueFull,
    /// The outbound queue stayed full for the whole send timeout.
    #[error("timed out waiting for outbound queue capacity")]
    Timeout,
    /// The message could not be encoded.
    #[error(transparent)]
    Encode(#[from] CodecError),
}

/// Callback invoked with a connection on open or close.
pub type ConnectionCallback = Arc<dyn Fn(&Connection) + Send + Sync>;

/// Optional lifecycle callbacks shared by all connections of a server.
#[derive(Clone, Default)]
pub struct ConnectionHooks {
    /// Runs after the connection tasks have been spawned.
    pub on_open: Option<ConnectionCallback>,
    /// Runs once, at the start of close, before the tasks are cancelled.
    pub on_close: Option<ConnectionCallback>,
}

impl fmt::Debug for ConnectionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHooks")
            .field("on_open", &self.on_open.as_ref().map(|_| "Some(<callback>)"))
            .field("on_close", &self.on_close.as_ref().map(|_| "Some(<callback>)"))
            .finish()
    }
}

/// Everything needed to build a [`Connection`].
pub(crate) struct ConnectionParts {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub transport: TransportKind,
    pub codec: Arc<dyn MessageCodec>,
    pub outbound_queue_size: usize,
    pub send_timeout: Option<Duration>,
    pub token: CancellationToken,
    pub registry: Weak<ConnectionRegistry>,
    pub worker: WorkerBinding,
    pub hooks: ConnectionHooks,
}

/// One live peer.
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    transport: TransportKind,
    outbound: mpsc::Sender<Bytes>,
    codec: Arc<dyn MessageCodec>,
    send_timeout: Option<Duration>,
    epoch: Instant,
    last_active_ms: AtomicU64,
    closed: AtomicBool,
    token: CancellationToken,
    registry: Weak<ConnectionRegistry>,
    worker: WorkerBinding,
    hooks: ConnectionHooks,
}

impl Connection {
    /// Build a connection, returning it with the receiving end of its
    /// outbound queue.
    pub(crate) fn new(parts: ConnectionParts) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let ConnectionParts {
            id,
            peer,
            transport,
            codec,
            outbound_queue_size,
            send_timeout,
            token,
            registry,
            worker,
            hooks,
        } = parts;
        let (tx, rx) = mpsc::channel(outbound_queue_size.max(1));
        let connection = Arc::new(Self {
            id,
            peer,
            transport,
            outbound: tx,
            codec,
            send_timeout,
            epoch: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            token,
            registry,
            worker,
            hooks,
        });
        (connection, rx)
    }

    /// Identifier of this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId { self.id }

    /// Remote address, when the transport exposes one.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> { self.peer }

    /// Transport carrying this connection.
    #[must_use]
    pub fn transport(&self) -> TransportKind { self.transport }

    /// Identifier of the worker executing this connection's requests.
    #[must_use]
    pub fn worker_id(&self) -> u64 { self.worker.worker_id() }

    /// Returns `true` once [`Connection::close`] has started.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    /// Token cancelled when the connection closes.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken { self.token.clone() }

    /// Record inbound activity now.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.store(elapsed, Ordering::Release);
    }

    /// Time since the last inbound activity (or since creation).
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Acquire));
        self.epoch.elapsed().saturating_sub(last)
    }

    /// Encode a message and queue it for the writer.
    ///
    /// Waits for queue capacity for at most the configured send timeout and
    /// gives up as soon as the connection closes. Handlers running on this
    /// connection's own worker should keep in mind that a stalled peer fills
    /// the queue and delays the worker by up to the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the connection is or becomes closed,
    /// [`SendError::Timeout`] if no capacity frees up in time, and
    /// [`SendError::Encode`] if the message cannot be encoded.
    pub async fn send_message(&self, event: u32, body: impl Into<Bytes>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        let frame = self.codec.encode(&Message::new(event, body))?;

        let enqueue = async {
            let send = self.outbound.send(frame);
            match self.send_timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .map_err(|_| SendError::Timeout)?
                    .map_err(|_| SendError::Closed),
                None => send.await.map_err(|_| SendError::Closed),
            }
        };

        tokio::select! {
            biased;

            () = self.token.cancelled() => Err(SendError::Closed),
            res = enqueue => res,
        }
    }

    /// Encode a message and queue it without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the connection is closed,
    /// [`SendError::QueueFull`] if the queue has no free slot, and
    /// [`SendError::Encode`] if the message cannot be encoded.
    pub fn try_send_message(&self, event: u32, body: impl Into<Bytes>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        let frame = self.codec.encode(&Message::new(event, body))?;
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("transport", &self.transport)
            .field("worker_id", &self.worker.worker_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
