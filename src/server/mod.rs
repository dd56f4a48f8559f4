//! Tokio-based server orchestrating listeners, connections and workers.
//!
//! A [`Server`] owns up to two listeners (raw TCP and WebSocket), the
//! [`ConnectionRegistry`], the frozen route table and the worker policy. Every
//! accepted socket is admitted against [`ServerConfig::max_connections`],
//! bound to a worker, registered and opened. Shutdown cancels the server
//! token, stops the workers, closes every registered connection and waits for
//! all spawned tasks.

use std::{
    fmt,
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::{Arc, OnceLock},
};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::oneshot,
};
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::{
    codec::{LittleEndianCodec, MessageCodec},
    connection::{Connection, ConnectionHooks, ConnectionId},
    frame::FrameReassembler,
    heartbeat::{Heartbeat, LivenessCheck},
    registry::ConnectionRegistry,
    router::Router,
    transport::{Transport, TransportKind},
};

mod config;
pub mod error;
mod runtime;

pub use config::{ServerConfig, WorkerMode};
pub use error::{ConfigError, ServerError};
/// Re-exported configuration types for server backoff behaviour.
pub use runtime::BackoffConfig;
use runtime::Shared;

#[cfg(test)]
pub(crate) mod test_util;

/// Event server for TCP and WebSocket peers.
///
/// # Examples
///
/// ```no_run
/// use eventwire::{
///     middleware::Recovery,
///     router::{Router, handler_fn},
///     server::{Server, ServerConfig},
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let router = Router::new().wrap(Recovery).route(
///     0,
///     handler_fn(|ctx| Box::pin(async move { let _ = ctx.send(0, "pong").await; })),
/// );
/// let server = Server::new(ServerConfig::default(), router)?
///     .bind(([127, 0, 0, 1], 9000).into())?
///     .bind_websocket(([127, 0, 0, 1], 9001).into())?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    router: Router,
    codec: Arc<dyn MessageCodec>,
    hooks: ConnectionHooks,
    heartbeat: Heartbeat,
    reassembler: FrameReassembler,
    span: Span,
    registry: Arc<ConnectionRegistry>,
    token: CancellationToken,
    running: Arc<OnceLock<Arc<Shared>>>,
    tcp: Option<TcpListener>,
    websocket: Option<TcpListener>,
    /// Fired once every listener task has been spawned.
    ready_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    /// Validate `config` and build a server serving `router`.
    ///
    /// No listener is bound yet; call [`Server::bind`] and/or
    /// [`Server::bind_websocket`] before running.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn new(config: ServerConfig, router: Router) -> Result<Self, ConfigError> {
        config.validate()?;
        let reassembler = FrameReassembler::new(config.frame)?;
        let span = tracing::info_span!("server", name = %config.name);
        Ok(Self {
            codec: Arc::new(LittleEndianCodec::new(config.max_message_size)),
            heartbeat: Heartbeat::new(config.heartbeat_interval, config.heartbeat_timeout),
            registry: Arc::new(ConnectionRegistry::new(config.registry_shards)),
            reassembler,
            config,
            router,
            hooks: ConnectionHooks::default(),
            span,
            token: CancellationToken::new(),
            running: Arc::new(OnceLock::new()),
            tcp: None,
            websocket: None,
            ready_tx: None,
        })
    }

    /// Settings this server was built with.
    #[must_use]
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Register a callback run after each connection opens.
    #[must_use]
    pub fn on_connection_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.hooks.on_open = Some(Arc::new(f));
        self
    }

    /// Register a callback run once when each connection closes.
    #[must_use]
    pub fn on_connection_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.hooks.on_close = Some(Arc::new(f));
        self
    }

    /// Replace the default [`LittleEndianCodec`].
    #[must_use]
    pub fn with_codec(mut self, codec: impl MessageCodec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Instrument every server task with `span` instead of the default
    /// `server` span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the heartbeat liveness check.
    #[must_use]
    pub fn with_liveness_check(mut self, check: impl LivenessCheck) -> Self {
        self.heartbeat = self.heartbeat.with_check(check);
        self
    }

    /// Configure a channel notified once the server is accepting connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Bind the raw TCP listener to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<Self, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_existing_listener(std_listener)
    }

    /// Use an existing listener for raw TCP connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_existing_listener(mut self, std_listener: StdTcpListener) -> Result<Self, ServerError> {
        self.tcp = Some(into_tokio(std_listener)?);
        Ok(self)
    }

    /// Bind the WebSocket listener to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind_websocket(self, addr: SocketAddr) -> Result<Self, ServerError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
        self.bind_existing_websocket_listener(std_listener)
    }

    /// Use an existing listener for WebSocket connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if configuring the listener fails.
    pub fn bind_existing_websocket_listener(
        mut self,
        std_listener: StdTcpListener,
    ) -> Result<Self, ServerError> {
        self.websocket = Some(into_tokio(std_listener)?);
        Ok(self)
    }

    /// Address of the TCP listener, if bound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Address of the WebSocket listener, if bound.
    #[must_use]
    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Registry of live connections, shared with the running server.
    #[must_use]
    pub fn registry(&self) -> Arc<ConnectionRegistry> { Arc::clone(&self.registry) }

    /// Handle for controlling the server once it runs.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            token: self.token.clone(),
            registry: Arc::clone(&self.registry),
            running: Arc::clone(&self.running),
        }
    }
}

fn into_tokio(std_listener: StdTcpListener) -> Result<TcpListener, ServerError> {
    std_listener
        .set_nonblocking(true)
        .map_err(ServerError::Bind)?;
    TcpListener::from_std(std_listener).map_err(ServerError::Bind)
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("tcp", &self.local_addr())
            .field("websocket", &self.websocket_addr())
            .finish_non_exhaustive()
    }
}

/// Cloneable control surface of a [`Server`].
#[derive(Clone)]
pub struct ServerHandle {
    token: CancellationToken,
    registry: Arc<ConnectionRegistry>,
    running: Arc<OnceLock<Arc<Shared>>>,
}

impl ServerHandle {
    /// Ask the server to shut down; `run` returns once cleanup finishes.
    pub fn shutdown(&self) { self.token.cancel(); }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool { self.token.is_cancelled() }

    /// Registry of live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> { &self.registry }

    /// Admit an already-established byte stream as a connection.
    ///
    /// The stream goes through the same admission control, worker assignment
    /// and registration as accepted sockets.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotRunning`] before `run` starts or after
    /// shutdown, and [`ServerError::ConnectionLimit`] when the server is full.
    pub fn attach_stream<S>(
        &self,
        stream: S,
        peer: Option<SocketAddr>,
    ) -> Result<ConnectionId, ServerError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let shared = self.running.get().ok_or(ServerError::NotRunning)?;
        let transport = Transport::from_stream(
            TransportKind::Stream,
            stream,
            peer,
            shared.config.max_read_buffer_size,
        );
        shared.admit(transport)
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("shutdown", &self.token.is_cancelled())
            .field("running", &self.running.get().is_some())
            .field("connections", &self.registry.len())
            .finish()
    }
}
