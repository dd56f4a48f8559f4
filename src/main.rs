//! Demo echo server built on `eventwire`.
//!
//! Event 0 is answered with `"pong"`, event 1 echoes its body, and every
//! request passes through the `Recovery` and `Logger` middleware.

mod cli;

use std::time::Duration;

use clap::Parser;
use eventwire::{
    Router,
    Server,
    ServerConfig,
    handler_fn,
    middleware::{Logger, Recovery},
    server::WorkerMode,
};
use tracing::warn;

const PING: u32 = 0;
const ECHO: u32 = 1;

fn config_from(cli: &cli::Cli) -> ServerConfig {
    ServerConfig {
        max_connections: cli.max_connections,
        worker_mode: match cli.workers {
            0 => WorkerMode::Dedicated,
            workers => WorkerMode::Pool { workers },
        },
        heartbeat_interval: Duration::from_secs(cli.heartbeat_interval),
        heartbeat_timeout: Duration::from_secs(cli.heartbeat_timeout),
        websocket_path: cli.websocket_path.clone(),
        ..ServerConfig::default()
    }
}

fn router() -> Router {
    Router::new()
        .wrap(Recovery)
        .wrap(Logger)
        .route(
            PING,
            handler_fn(|ctx| {
                Box::pin(async move {
                    if let Err(e) = ctx.send(PING, "pong").await {
                        warn!(error = %e, "pong not sent");
                    }
                })
            }),
        )
        .route(
            ECHO,
            handler_fn(|ctx| {
                Box::pin(async move {
                    let body = ctx.request().body().clone();
                    if let Err(e) = ctx.send(ECHO, body).await {
                        warn!(error = %e, "echo not sent");
                    }
                })
            }),
        )
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    warn!(%addr, "built without the metrics feature, exporter disabled");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    if let Some(addr) = cli.metrics {
        install_metrics(addr)?;
    }

    let mut server = Server::new(config_from(&cli), router())?.bind(cli.tcp)?;
    if let Some(addr) = cli.websocket {
        server = server.bind_websocket(addr)?;
    }
    server.run().await?;
    Ok(())
}
