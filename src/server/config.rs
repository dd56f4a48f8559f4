//! Configuration for [`super::Server`].

use std::time::Duration;

use super::{BackoffConfig, ConfigError};
use crate::frame::FrameConfig;

/// How requests are mapped onto workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerMode {
    /// Every connection gets its own worker, stopped when it closes.
    Dedicated,
    /// A fixed pool shared by all connections; connection `id` is served by
    /// worker `id % workers`.
    Pool {
        /// Number of workers in the pool.
        workers: usize,
    },
}

impl Default for WorkerMode {
    fn default() -> Self { Self::Pool { workers: 10 } }
}

/// Server settings, validated once by [`super::Server::new`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use eventwire::server::{ServerConfig, WorkerMode};
///
/// let config = ServerConfig {
///     max_connections: 3,
///     worker_mode: WorkerMode::Dedicated,
///     heartbeat_timeout: Duration::from_secs(30),
///     ..ServerConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Name recorded on the server tracing span.
    pub name: String,
    /// Soft limit on registered connections.
    pub max_connections: usize,
    /// Size of the per-connection read buffer.
    pub max_read_buffer_size: usize,
    /// Capacity of each connection's outbound queue.
    pub outbound_queue_size: usize,
    /// Longest wait for outbound queue capacity; `None` waits until close.
    pub send_timeout: Option<Duration>,
    /// Worker deployment.
    pub worker_mode: WorkerMode,
    /// Capacity of each worker's task queue.
    pub worker_queue_size: usize,
    /// Heartbeat tick period.
    pub heartbeat_interval: Duration,
    /// Inactivity after which the default liveness check closes a connection.
    pub heartbeat_timeout: Duration,
    /// Number of registry shards, rounded up to a power of two.
    pub registry_shards: usize,
    /// Length-field framing of the byte stream.
    pub frame: FrameConfig,
    /// Largest body accepted by the default codec; `None` disables the check.
    pub max_message_size: Option<usize>,
    /// Request path accepted by the WebSocket listener.
    pub websocket_path: String,
    /// Period of the connection-count log line; `None` disables it.
    pub monitor_interval: Option<Duration>,
    /// Retry timing for failed accepts.
    pub backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "eventwire".to_owned(),
            max_connections: 1024,
            max_read_buffer_size: 1024,
            outbound_queue_size: 1024,
            send_timeout: Some(Duration::from_secs(5)),
            worker_mode: WorkerMode::default(),
            worker_queue_size: 1024,
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(60),
            registry_shards: 32,
            frame: FrameConfig::default(),
            max_message_size: None,
            websocket_path: "/ws".to_owned(),
            monitor_interval: Some(Duration::from_secs(3)),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let WorkerMode::Pool { workers: 0 } = self.worker_mode {
            return Err(ConfigError::EmptyPool);
        }
        if self.worker_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize { queue: "worker" });
        }
        if self.outbound_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize { queue: "outbound" });
        }
        if self.max_read_buffer_size == 0 {
            return Err(ConfigError::ZeroReadBuffer);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroMaxConnections);
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeatInterval);
        }
        if self.heartbeat_timeout < self.heartbeat_interval {
            return Err(ConfigError::HeartbeatTimeoutTooShort {
                timeout: self.heartbeat_timeout,
                interval: self.heartbeat_interval,
            });
        }
        if !self.websocket_path.starts_with('/') {
            return Err(ConfigError::InvalidWebSocketPath(
                self.websocket_path.clone(),
            ));
        }
        self.frame.validate()?;
        Ok(())
    }
}
