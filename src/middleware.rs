//! Built-in middleware.
//!
//! Both types are ordinary [`Handler`]s meant to be registered with
//! [`crate::router::Router::wrap`] ahead of the routes they cover.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    context::Context,
    message::{SERVER_ERROR, SERVER_ERROR_BODY},
    metrics,
    panic::format_panic,
    router::Handler,
};

/// Catches panics raised by the rest of the chain.
///
/// The panic is logged and the peer receives the reserved `500`
/// `"Server Error"` response. The connection and its worker keep serving.
#[derive(Clone, Copy, Debug, Default)]
pub struct Recovery;

#[async_trait]
impl Handler for Recovery {
    async fn call(&self, ctx: &mut Context) {
        let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;
        let Err(panic) = outcome else {
            return;
        };
        ctx.abort();

        metrics::inc_handler_panics();
        let panic_msg = format_panic(panic);
        error!(
            connection_id = %ctx.connection().id(),
            event = ctx.request().event(),
            panic = %panic_msg,
            "handler panicked, sending server error"
        );
        if let Err(e) = ctx.send(SERVER_ERROR, SERVER_ERROR_BODY).await {
            warn!(
                connection_id = %ctx.connection().id(),
                error = %e,
                "failed to send server error response"
            );
        }
    }
}

/// Logs every request once the rest of the chain has finished.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

#[async_trait]
impl Handler for Logger {
    async fn call(&self, ctx: &mut Context) {
        let started = Instant::now();
        ctx.next().await;
        let latency = started.elapsed();

        let connection = ctx.connection();
        info!(
            connection_id = %connection.id(),
            peer = ?connection.peer(),
            event = ctx.request().event(),
            body_size = ctx.request().message().body_size(),
            latency_us = latency.as_micros(),
            "request handled"
        );
    }
}
