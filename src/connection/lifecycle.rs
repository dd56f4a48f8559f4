//! Opening and closing connections.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, atomic::Ordering},
};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error};

use super::{Connection, ConnectionCallback, io};
use crate::{
    frame::FrameReassembler,
    heartbeat::Heartbeat,
    panic::format_panic,
    router::RouteTable,
    transport::{TransportReader, TransportWriter},
};

/// Resources moved into the connection tasks on open.
pub(crate) struct ConnectionIo {
    pub reader: Box<dyn TransportReader>,
    pub writer: Box<dyn TransportWriter>,
    pub outbound: mpsc::Receiver<Bytes>,
    pub reassembler: FrameReassembler,
    pub routes: Arc<RouteTable>,
    pub heartbeat: Heartbeat,
}

impl Connection {
    /// Spawn the reader, writer and heartbeat tasks, then run the open hook.
    pub(crate) fn open(self: &Arc<Self>, parts: ConnectionIo, tracker: &TaskTracker, span: &Span) {
        let ConnectionIo {
            reader,
            writer,
            outbound,
            reassembler,
            routes,
            heartbeat,
        } = parts;

        tracker.spawn(
            io::read_loop(Arc::clone(self), reader, reassembler, routes).instrument(span.clone()),
        );
        tracker.spawn(io::write_loop(Arc::clone(self), writer, outbound).instrument(span.clone()));
        tracker.spawn(
            heartbeat
                .monitor(self.token.clone())
                .run(Arc::clone(self))
                .instrument(span.clone()),
        );

        debug!(
            connection_id = %self.id,
            peer = ?self.peer,
            transport = %self.transport,
            worker_id = self.worker.worker_id(),
            "connection opened"
        );
        if let Some(hook) = &self.hooks.on_open {
            self.run_hook("on_open", hook);
        }
    }

    /// Close the connection and remove it from its registry.
    ///
    /// Only the first call has any effect: it runs the close hook, cancels
    /// the connection tasks, deregisters the connection and releases a
    /// dedicated worker. Later calls return immediately.
    pub fn close(&self) { self.close_with(true); }

    pub(crate) fn close_with(&self, deregister: bool) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Some(hook) = &self.hooks.on_close {
            self.run_hook("on_close", hook);
        }
        self.token.cancel();
        if deregister && let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.worker.release();
        debug!(connection_id = %self.id, peer = ?self.peer, "connection closed");
    }

    fn run_hook(&self, name: &'static str, hook: &ConnectionCallback) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(self))) {
            let panic_msg = format_panic(panic);
            error!(
                connection_id = %self.id,
                hook = name,
                panic = %panic_msg,
                "connection hook panicked"
            );
        }
    }
}
