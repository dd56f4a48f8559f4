//! Errors raised by [`super::Server`] construction and operation.

use std::{io, time::Duration};

use thiserror::Error;

/// Invalid [`super::ServerConfig`] values, reported by [`super::Server::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Pool mode needs at least one worker.
    #[error("worker pool must have at least one worker")]
    EmptyPool,
    /// A queue depth of zero would block every send.
    #[error("{queue} queue size must be greater than zero")]
    ZeroQueueSize {
        /// Which queue was misconfigured.
        queue: &'static str,
    },
    /// Reads need room for at least one byte.
    #[error("max read buffer size must be greater than zero")]
    ZeroReadBuffer,
    /// Admission control would refuse every connection.
    #[error("max connections must be greater than zero")]
    ZeroMaxConnections,
    /// The heartbeat ticker needs a positive period.
    #[error("heartbeat interval must be greater than zero")]
    ZeroHeartbeatInterval,
    /// The idle timeout is shorter than one tick.
    #[error("heartbeat timeout {timeout:?} is shorter than the interval {interval:?}")]
    HeartbeatTimeoutTooShort {
        /// Configured timeout.
        timeout: Duration,
        /// Configured interval.
        interval: Duration,
    },
    /// WebSocket upgrades must target an absolute path.
    #[error("websocket path must start with '/': {0:?}")]
    InvalidWebSocketPath(String),
    /// The frame layout cannot be decoded.
    #[error(transparent)]
    Frame(#[from] crate::frame::FrameConfigError),
}

/// Errors that may occur while binding or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or configuring a listener failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
    /// Accepting a connection failed.
    #[error("accept error: {0}")]
    Accept(#[from] io::Error),
    /// `run` was called without a TCP or WebSocket listener.
    #[error("no listener bound")]
    NoListener,
    /// The server is not running, so it cannot take connections.
    #[error("server is not running")]
    NotRunning,
    /// Admission control refused the connection.
    #[error("connection limit of {max} reached")]
    ConnectionLimit {
        /// Configured maximum.
        max: usize,
    },
}
