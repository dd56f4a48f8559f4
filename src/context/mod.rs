//! Per-request execution state.
//!
//! A [`Context`] binds one decoded [`Request`] to the connection it arrived on
//! and the ordered handler chain selected by the router. It is created by the
//! connection reader, consumed by exactly one worker and dropped once the
//! chain returns.

use std::{fmt, sync::Arc};

use bytes::Bytes;

use crate::{
    connection::{Connection, SendError},
    message::Message,
    router::HandlerRef,
};

mod values;

pub use values::Values;

/// An inbound message awaiting dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    message: Message,
}

impl Request {
    /// Wrap a decoded message.
    #[must_use]
    pub fn new(message: Message) -> Self { Self { message } }

    /// The decoded message.
    #[must_use]
    pub fn message(&self) -> &Message { &self.message }

    /// Event identifier of the message.
    #[must_use]
    pub fn event(&self) -> u32 { self.message.event() }

    /// Body of the message.
    #[must_use]
    pub fn body(&self) -> &Bytes { self.message.body() }

    /// Consume the request, returning its message.
    #[must_use]
    pub fn into_message(self) -> Message { self.message }
}

/// Cooperative handler chain over one request.
///
/// The chain is an ordered list with a cursor. [`Context::next`] runs the
/// handler under the cursor and advances it; a handler that returns without
/// calling `next` ends the chain there.
pub struct Context {
    connection: Arc<Connection>,
    request: Request,
    handlers: Arc<[HandlerRef]>,
    cursor: usize,
    values: Values,
}

impl Context {
    /// Bind `request` on `connection` to a handler chain.
    #[must_use]
    pub fn new(connection: Arc<Connection>, request: Request, handlers: Arc<[HandlerRef]>) -> Self {
        Self {
            connection,
            request,
            handlers,
            cursor: 0,
            values: Values::default(),
        }
    }

    /// Connection the request arrived on.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> { &self.connection }

    /// The request being handled.
    #[must_use]
    pub fn request(&self) -> &Request { &self.request }

    /// Run every remaining handler in order.
    ///
    /// A middleware that calls `next` resumes once the rest of the chain has
    /// run. A handler that returns without calling `next` does not stop the
    /// chain; use [`Context::abort`] for that.
    pub async fn next(&mut self) {
        while let Some(handler) = self.handlers.get(self.cursor).cloned() {
            self.cursor += 1;
            handler.call(self).await;
        }
    }

    /// Skip every handler that has not run yet.
    pub fn abort(&mut self) { self.cursor = self.handlers.len(); }

    /// Returns `true` when no handlers remain.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.cursor >= self.handlers.len() }

    /// Number of handlers in the chain.
    #[must_use]
    pub fn chain_len(&self) -> usize { self.handlers.len() }

    /// Store a request-scoped value under `key`.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key, value);
    }

    /// Fetch a request-scoped value stored under `key`.
    #[must_use]
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.values.get(key)
    }

    /// All request-scoped values.
    #[must_use]
    pub fn values(&self) -> &Values { &self.values }

    /// Send a message to the peer of this request's connection.
    ///
    /// # Errors
    ///
    /// See [`Connection::send_message`].
    pub async fn send(&self, event: u32, body: impl Into<Bytes>) -> Result<(), SendError> {
        self.connection.send_message(event, body).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("connection_id", &self.connection.id())
            .field("event", &self.request.event())
            .field("cursor", &self.cursor)
            .field("chain_len", &self.handlers.len())
            .field("values", &self.values)
            .finish()
    }
}
