//! Helpers for building connections in unit tests without a socket.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Connection, ConnectionHooks, ConnectionId, ConnectionParts};
use crate::{
    codec::{LittleEndianCodec, MessageCodec},
    context::Context,
    registry::ConnectionRegistry,
    transport::TransportKind,
    worker::{WorkerBinding, WorkerHandle},
};

/// A connection plus the channels a test inspects.
pub(crate) struct TestConnection {
    pub connection: Arc<Connection>,
    pub outbound: mpsc::Receiver<Bytes>,
    pub submitted: mpsc::Receiver<Context>,
}

/// Builder for [`TestConnection`].
pub(crate) struct TestConnectionBuilder {
    id: u64,
    queue_size: usize,
    send_timeout: Option<Duration>,
    hooks: ConnectionHooks,
    registry: Weak<ConnectionRegistry>,
    token: CancellationToken,
    codec: Arc<dyn MessageCodec>,
}

impl Default for TestConnectionBuilder {
    fn default() -> Self {
        Self {
            id: 1,
            queue_size: 8,
            send_timeout: Some(Duration::from_millis(100)),
            hooks: ConnectionHooks::default(),
            registry: Weak::new(),
            token: CancellationToken::new(),
            codec: Arc::new(LittleEndianCodec::default()),
        }
    }
}

impl TestConnectionBuilder {
    pub fn id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn hooks(mut self, hooks: ConnectionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn registry(mut self, registry: &Arc<ConnectionRegistry>) -> Self {
        self.registry = Arc::downgrade(registry);
        self
    }

    pub fn codec(mut self, codec: impl MessageCodec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn build(self) -> TestConnection {
        let (handle, submitted) = WorkerHandle::detached(0, self.queue_size);
        let (connection, outbound) = Connection::new(ConnectionParts {
            id: ConnectionId::new(self.id),
            peer: None,
            transport: TransportKind::Stream,
            codec: self.codec,
            outbound_queue_size: self.queue_size,
            send_timeout: self.send_timeout,
            token: self.token,
            registry: self.registry,
            worker: WorkerBinding::Pooled(handle),
            hooks: self.hooks,
        });
        TestConnection {
            connection,
            outbound,
            submitted,
        }
    }
}

/// A connection with default settings and the given id.
pub(crate) fn test_connection(id: u64) -> TestConnection {
    TestConnectionBuilder::default().id(id).build()
}
