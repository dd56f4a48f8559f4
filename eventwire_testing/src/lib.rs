//! Utilities for exercising an `eventwire` server from integration tests.
//!
//! [`TestServer`] runs a server on ephemeral localhost ports and shuts it
//! down when dropped; [`TestClient`] and [`WsTestClient`] speak the default
//! little-endian wire format and reassemble replies into
//! [`Message`](eventwire::Message)s.
//!
//! ```rust,no_run
//! use eventwire::{Router, ServerConfig};
//! use eventwire_testing::{TestClient, TestResult, TestServer};
//!
//! # async fn example() -> TestResult {
//! let server = TestServer::start(ServerConfig::default(), Router::new()).await?;
//! let mut client = TestClient::connect(server.addr()).await?;
//! client.send(7, "hello").await?;
//! let reply = client.recv().await?;
//! assert_eq!(reply.map(|m| m.event()), Some(404));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod frames;
pub mod macros;
pub mod metrics;
pub mod server;

pub use client::{TestClient, WsTestClient};
pub use frames::{chunk_at, chunks_of, encode_message, encode_messages};
pub use server::{TestServer, test_config, unused_listener};

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
