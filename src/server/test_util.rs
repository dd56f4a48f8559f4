//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    time::Duration,
};

use rstest::fixture;

use super::{Server, ServerConfig};
use crate::router::{Router, handler_fn};

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents another process claiming the port
/// between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Extract the bound address from a listener.
#[must_use]
pub fn listener_addr(listener: &StdTcpListener) -> SocketAddr {
    listener
        .local_addr()
        .expect("failed to get listener address")
}

#[fixture]
/// Router answering event 0 with `"pong"`.
pub fn ping_router() -> Router {
    Router::new().route(
        0,
        handler_fn(|ctx| {
            Box::pin(async move {
                let _ = ctx.send(0, "pong").await;
            })
        }),
    )
}

/// Small configuration with quiet logging intervals.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        max_connections: 8,
        monitor_interval: None,
        heartbeat_interval: Duration::from_secs(30),
        heartbeat_timeout: Duration::from_secs(60),
        ..ServerConfig::default()
    }
}

pub fn bind_server(config: ServerConfig, router: Router, listener: StdTcpListener) -> Server {
    Server::new(config, router)
        .expect("valid config")
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}
