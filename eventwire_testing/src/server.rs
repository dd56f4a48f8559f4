//! Harness running a server on ephemeral localhost ports.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use eventwire::{
    ConnectionRegistry,
    Router,
    Server,
    ServerConfig,
    ServerError,
    ServerHandle,
};
use rstest::fixture;
use tokio::{sync::oneshot, task::JoinHandle, time::timeout};

use crate::TestResult;

/// How long [`TestServer::shutdown`] waits for the server task to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a TCP listener bound to a free local port.
///
/// # Errors
///
/// Returns any IO error encountered while binding.
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// Configuration with small limits and no periodic monitor output.
#[fixture]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        max_connections: 16,
        monitor_interval: None,
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_timeout: Duration::from_secs(60),
        ..ServerConfig::default()
    }
}

/// A running server.
///
/// Dropping the harness cancels the server; call
/// [`shutdown`](Self::shutdown) to also wait for it to stop.
#[derive(Debug)]
pub struct TestServer {
    addr: Option<SocketAddr>,
    websocket_addr: Option<SocketAddr>,
    handle: ServerHandle,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl TestServer {
    /// Run `router` with `config` on an ephemeral TCP port.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, binding fails, or
    /// the server stops before signalling readiness.
    pub async fn start(config: ServerConfig, router: Router) -> TestResult<Self> {
        let server = Server::new(config, router)?.bind_existing_listener(unused_listener()?)?;
        Self::spawn(server).await
    }

    /// Like [`start`](Self::start) but also listen for WebSocket clients.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub async fn start_with_websocket(config: ServerConfig, router: Router) -> TestResult<Self> {
        let server = Server::new(config, router)?
            .bind_existing_listener(unused_listener()?)?
            .bind_existing_websocket_listener(unused_listener()?)?;
        Self::spawn(server).await
    }

    /// Run an already configured and bound server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server stops before signalling readiness.
    pub async fn spawn(server: Server) -> TestResult<Self> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = server.ready_signal(ready_tx);
        let addr = server.local_addr();
        let websocket_addr = server.websocket_addr();
        let handle = server.handle();
        let task = tokio::spawn(server.run_with_shutdown(std::future::pending()));

        if ready_rx.await.is_err() {
            let result = task.await?;
            result?;
            return Err("server stopped before it was ready".into());
        }
        Ok(Self {
            addr,
            websocket_addr,
            handle,
            task: Some(task),
        })
    }

    /// Address of the TCP listener.
    ///
    /// # Panics
    ///
    /// Panics if the server was spawned without a TCP listener.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr.expect("server has a TCP listener") }

    /// Address of the WebSocket listener.
    ///
    /// # Panics
    ///
    /// Panics if the server was started without WebSocket support.
    #[must_use]
    pub fn websocket_addr(&self) -> SocketAddr {
        self.websocket_addr
            .expect("server has a WebSocket listener")
    }

    /// Handle to the running server.
    #[must_use]
    pub fn handle(&self) -> &ServerHandle { &self.handle }

    /// Registry of live connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> { self.handle.registry() }

    /// Poll until `len` connections are registered or `limit` elapses.
    pub async fn wait_for_connections(&self, len: usize, limit: Duration) -> bool {
        timeout(limit, async {
            while self.registry().len() != len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Stop the server and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns the server's own error, a join error, or a timeout.
    pub async fn shutdown(mut self) -> TestResult {
        self.handle.shutdown();
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        timeout(SHUTDOWN_TIMEOUT, task).await???;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) { self.handle.shutdown(); }
}
