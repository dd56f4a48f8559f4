//! Accept-loop utilities for server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tracing::Instrument;

use super::{Shared, backoff::BackoffConfig};
use crate::transport::{Transport, TransportKind, websocket};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

/// Protocol spoken by the sockets a listener accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::server) enum ListenerKind {
    /// Length-framed messages directly on the TCP stream.
    Tcp,
    /// Messages inside WebSocket data frames after an HTTP upgrade.
    WebSocket,
}

/// Accept connections from `listener` until the server token is cancelled.
///
/// TCP sockets are admitted synchronously, so a single listener never
/// registers more than `max_connections`. WebSocket sockets are checked
/// against the limit on accept and again once the upgrade completes. Accept
/// failures back off exponentially between `initial_delay` and `max_delay`.
pub(in crate::server) async fn accept_loop<L>(listener: Arc<L>, kind: ListenerKind, shared: Arc<Shared>)
where
    L: AcceptListener + 'static,
{
    let backoff = shared.config.backoff.normalized();
    debug_assert!(
        backoff.initial_delay <= backoff.max_delay,
        "BackoffConfig invariant violated: initial_delay > max_delay"
    );
    let mut delay = backoff.initial_delay;
    while let Some(next_delay) = accept_iteration(listener.as_ref(), kind, &shared, &backoff, delay).await {
        delay = next_delay;
    }
}

async fn accept_iteration<L>(
    listener: &L,
    kind: ListenerKind,
    shared: &Arc<Shared>,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    L: AcceptListener,
{
    select! {
        biased;

        () = shared.token.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer)) => {
                handle_accepted(kind, stream, peer, shared);
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}, listener={kind:?}");
                sleep(delay).await;
                (delay * 2).min(backoff.max_delay)
            }
        }),
    }
}

fn handle_accepted(kind: ListenerKind, stream: TcpStream, peer: SocketAddr, shared: &Arc<Shared>) {
    match kind {
        ListenerKind::Tcp => {
            let transport = Transport::from_stream(
                TransportKind::Tcp,
                stream,
                Some(peer),
                shared.config.max_read_buffer_size,
            );
            if let Ok(id) = shared.admit(transport) {
                debug!("connection accepted: connection_id={id}, peer={peer}, transport=tcp");
            }
        }
        ListenerKind::WebSocket => {
            if shared.at_capacity() {
                let _ = shared.reject(Some(peer), TransportKind::WebSocket);
                return;
            }
            let upgrade = upgrade(stream, peer, Arc::clone(shared)).instrument(shared.span.clone());
            shared.tracker.spawn(upgrade);
        }
    }
}

/// Complete the WebSocket handshake, then admit the session.
async fn upgrade(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) {
    let handshake = websocket::accept(
        stream,
        &shared.config.websocket_path,
        Some(peer),
        shared.config.max_read_buffer_size,
    );
    let result = select! {
        biased;

        () = shared.token.cancelled() => return,
        res = handshake => res,
    };
    match result {
        Ok(transport) => {
            if let Ok(id) = shared.admit(transport) {
                debug!("connection accepted: connection_id={id}, peer={peer}, transport=websocket");
            }
        }
        Err(e) => debug!("websocket handshake failed: peer={peer}, error={e}"),
    }
}
