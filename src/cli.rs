//! Command line interface for the `eventwire` demo server.
//!
//! Kept free of crate imports so `build.rs` can include it to render the
//! man page.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `eventwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "eventwire",
    version,
    about = "Echo server answering event 0 with \"pong\" and echoing event 1"
)]
pub struct Cli {
    /// Address for raw TCP clients.
    #[arg(long, default_value = "127.0.0.1:9000")]
    pub tcp: SocketAddr,
    /// Address for WebSocket clients; WebSocket is disabled when omitted.
    #[arg(long)]
    pub websocket: Option<SocketAddr>,
    /// Request path accepted for WebSocket upgrades.
    #[arg(long, default_value = "/ws")]
    pub websocket_path: String,
    /// Shared worker pool size; 0 gives every connection its own worker.
    #[arg(short, long, default_value_t = 10)]
    pub workers: usize,
    /// Connections accepted before new ones are refused.
    #[arg(long, default_value_t = 1024)]
    pub max_connections: usize,
    /// Seconds between heartbeat checks.
    #[arg(long, default_value_t = 5)]
    pub heartbeat_interval: u64,
    /// Seconds of silence after which a connection is closed.
    #[arg(long, default_value_t = 60)]
    pub heartbeat_timeout: u64,
    /// Address for the Prometheus scrape endpoint.
    #[arg(long)]
    pub metrics: Option<SocketAddr>,
}
