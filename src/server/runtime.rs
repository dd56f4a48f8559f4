//! Runtime control for [`Server`].

mod accept;
mod backoff;

use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{ListenerKind, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;
use tokio::{
    net::TcpListener,
    select,
    signal,
    sync::oneshot,
    time::{Instant, interval_at},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, Span, info};

use super::{Server, ServerConfig, ServerError, WorkerMode};
use crate::{
    codec::MessageCodec,
    connection::{Connection, ConnectionHooks, ConnectionId, ConnectionIo, ConnectionParts},
    frame::FrameReassembler,
    heartbeat::Heartbeat,
    metrics,
    registry::ConnectionRegistry,
    router::RouteTable,
    transport::{Transport, TransportKind},
    worker::{Worker, WorkerBinding, WorkerPool},
};

/// State shared by the accept loops and [`super::ServerHandle`] while the
/// server runs.
pub(in crate::server) struct Shared {
    pub config: ServerConfig,
    pub routes: Arc<RouteTable>,
    pub codec: Arc<dyn MessageCodec>,
    pub hooks: ConnectionHooks,
    pub heartbeat: Heartbeat,
    pub reassembler: FrameReassembler,
    pub registry: Arc<ConnectionRegistry>,
    pub pool: Option<WorkerPool>,
    pub token: CancellationToken,
    pub tracker: TaskTracker,
    pub span: Span,
    next_id: AtomicU64,
}

impl Shared {
    /// Returns `true` when admission control would refuse a connection.
    pub fn at_capacity(&self) -> bool { self.registry.len() >= self.config.max_connections }

    /// Log and count a refused connection.
    pub fn reject(&self, peer: Option<SocketAddr>, kind: TransportKind) -> ServerError {
        metrics::inc_rejected();
        let max = self.config.max_connections;
        warn!(
            "connection rejected: reason=limit, max_connections={max}, peer={peer:?}, transport={kind}"
        );
        ServerError::ConnectionLimit { max }
    }

    /// Admit `transport`: check the limit, bind a worker, register and open
    /// the connection.
    ///
    /// Dropping a refused transport closes its socket.
    pub fn admit(&self, transport: Transport) -> Result<ConnectionId, ServerError> {
        if self.token.is_cancelled() {
            return Err(ServerError::NotRunning);
        }
        if self.at_capacity() {
            return Err(self.reject(transport.peer(), transport.kind()));
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let worker = match &self.pool {
            Some(pool) => WorkerBinding::Pooled(pool.assign(id)),
            None => WorkerBinding::Dedicated(Worker::spawn(
                id.as_u64(),
                self.config.worker_queue_size,
                &self.token,
                &self.tracker,
            )),
        };

        let Transport {
            kind,
            peer,
            reader,
            writer,
        } = transport;
        let (connection, outbound) = Connection::new(ConnectionParts {
            id,
            peer,
            transport: kind,
            codec: Arc::clone(&self.codec),
            outbound_queue_size: self.config.outbound_queue_size,
            send_timeout: self.config.send_timeout,
            token: self.token.child_token(),
            registry: Arc::downgrade(&self.registry),
            worker,
            hooks: self.hooks.clone(),
        });
        self.registry.add(Arc::clone(&connection));
        connection.open(
            ConnectionIo {
                reader,
                writer,
                outbound,
                reassembler: self.reassembler.clone(),
                routes: Arc::clone(&self.routes),
                heartbeat: self.heartbeat.clone(),
            },
            &self.tracker,
            &self.span,
        );
        Ok(id)
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pool", &self.pool.as_ref().map(WorkerPool::len))
            .finish_non_exhaustive()
    }
}

/// Listeners and readiness channel taken out of a [`Server`] at start.
pub(in crate::server) struct Listeners {
    pub tcp: Option<TcpListener>,
    pub websocket: Option<TcpListener>,
    pub ready_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    /// Freeze the router, spawn the worker pool and publish the shared state.
    pub(in crate::server) fn start(self) -> (Arc<Shared>, Listeners) {
        let Server {
            config,
            router,
            codec,
            hooks,
            heartbeat,
            reassembler,
            span,
            registry,
            token,
            running,
            tcp,
            websocket,
            ready_tx,
        } = self;

        let tracker = TaskTracker::new();
        let pool = match config.worker_mode {
            WorkerMode::Pool { workers } => Some(WorkerPool::spawn(
                workers,
                config.worker_queue_size,
                &token,
                &tracker,
            )),
            WorkerMode::Dedicated => None,
        };
        let shared = Arc::new(Shared {
            routes: Arc::new(router.into_table()),
            config,
            codec,
            hooks,
            heartbeat,
            reassembler,
            registry,
            pool,
            token,
            tracker,
            span,
            next_id: AtomicU64::new(0),
        });
        // `running` is only ever set here and `start` consumes the server.
        let _ = running.set(Arc::clone(&shared));
        (shared, Listeners {
            tcp,
            websocket,
            ready_tx,
        })
    }

    /// Run the server until Ctrl-C or, on Unix, SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoListener`] if neither a TCP nor a WebSocket
    /// listener was bound. Accept failures are retried with exponential
    /// back-off and do not surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves or
    /// [`super::ServerHandle::shutdown`] is called.
    ///
    /// On shutdown the listeners stop accepting, the workers stop, every
    /// registered connection is closed and all spawned tasks are awaited.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventwire::{router::Router, server::{Server, ServerConfig}};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let server = Server::new(ServerConfig::default(), Router::new())?
    ///     .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let task = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    /// let _ = tx.send(());
    /// task.await??;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NoListener`] if no listener was bound.
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        if self.tcp.is_none() && self.websocket.is_none() {
            return Err(ServerError::NoListener);
        }
        let (shared, listeners) = self.start();
        let Listeners {
            tcp,
            websocket,
            ready_tx,
        } = listeners;

        for (listener, kind) in [(tcp, ListenerKind::Tcp), (websocket, ListenerKind::WebSocket)] {
            let Some(listener) = listener else {
                continue;
            };
            if let Ok(addr) = listener.local_addr() {
                info!(%addr, listener = ?kind, "listening");
            }
            shared.tracker.spawn(
                accept_loop(Arc::new(listener), kind, Arc::clone(&shared))
                    .instrument(shared.span.clone()),
            );
        }
        if let Some(every) = shared.config.monitor_interval {
            shared.tracker.spawn(
                monitor(Arc::clone(&shared.registry), every, shared.token.clone())
                    .instrument(shared.span.clone()),
            );
        }

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => {},
            () = shared.token.cancelled() => {},
        }
        shutdown_gracefully(&shared).await;
        Ok(())
    }
}

/// Stop accepting, stop workers, close every connection and wait for tasks.
async fn shutdown_gracefully(shared: &Shared) {
    info!(parent: &shared.span, "shutting down");
    shared.token.cancel();
    if let Some(pool) = &shared.pool {
        pool.stop();
    }
    let closed = shared.registry.clear();

    shared.tracker.close();
    shared.tracker.wait().await;
    info!(parent: &shared.span, closed, "server stopped");
}

/// Log the live connection count every `every` until cancelled.
async fn monitor(registry: Arc<ConnectionRegistry>, every: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + every, every);
    loop {
        select! {
            biased;

            () = token.cancelled() => break,
            _ = ticker.tick() => info!(connections = registry.len(), "connection count"),
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable, waiting for Ctrl-C only: error={e}");
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
