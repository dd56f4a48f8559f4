#![doc(html_root_url = "https://docs.rs/eventwire/latest")]
//! Public API for the `eventwire` library.
//!
//! `eventwire` serves event-routed binary messages over TCP and WebSocket.
//! Inbound bytes are cut into frames by a configurable length-field
//! [`frame::FrameReassembler`], decoded into [`Message`]s by a pluggable
//! [`MessageCodec`], and dispatched through a middleware chain selected by
//! the message's event id. Requests from one connection always run in arrival
//! order on a single worker.
//!
//! ```no_run
//! use eventwire::{
//!     Router,
//!     Server,
//!     ServerConfig,
//!     handler_fn,
//!     middleware::{Logger, Recovery},
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new().wrap(Recovery).wrap(Logger).route(
//!     1,
//!     handler_fn(|ctx| {
//!         Box::pin(async move {
//!             let body = ctx.request().body().clone();
//!             let _ = ctx.send(1, body).await;
//!         })
//!     }),
//! );
//! Server::new(ServerConfig::default(), router)?
//!     .bind(([127, 0, 0, 1], 9000).into())?
//!     .run()
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod byte_order;
pub mod codec;
pub mod connection;
pub mod context;
pub mod frame;
pub mod heartbeat;
pub mod message;
pub mod metrics;
pub mod middleware;
pub mod panic;
pub mod registry;
pub mod router;
pub mod server;
pub mod transport;
pub mod worker;

pub use codec::{CodecError, LittleEndianCodec, MessageCodec};
pub use connection::{Connection, ConnectionId, SendError};
pub use context::{Context, Request};
pub use message::Message;
pub use registry::ConnectionRegistry;
pub use router::{Handler, Router, handler_fn};
pub use server::{Server, ServerConfig, ServerError, ServerHandle};
