//! Reader and writer loops.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, warn};

use super::Connection;
use crate::{
    context::{Context, Request},
    frame::FrameReassembler,
    metrics::{self, Direction, ErrorKind},
    router::RouteTable,
    transport::{Inbound, TransportReader, TransportWriter},
};

/// Read chunks until EOF, a fatal error or close, dispatching each complete
/// frame to the bound worker in arrival order.
pub(super) async fn read_loop(
    conn: Arc<Connection>,
    mut reader: Box<dyn TransportReader>,
    mut reassembler: FrameReassembler,
    routes: Arc<RouteTable>,
) {
    loop {
        let inbound = tokio::select! {
            biased;

            () = conn.token.cancelled() => break,
            res = reader.read_chunk() => res,
        };

        match inbound {
            Ok(Inbound::Data(chunk)) => {
                conn.touch();
                if !dispatch(&conn, &mut reassembler, &routes, &chunk).await {
                    break;
                }
            }
            Ok(Inbound::KeepAlive) => conn.touch(),
            Ok(Inbound::Eof) => {
                debug!(connection_id = %conn.id, "peer closed the transport");
                break;
            }
            Err(e) => {
                metrics::inc_errors(ErrorKind::Transport);
                debug!(connection_id = %conn.id, error = %e, "transport read failed");
                break;
            }
        }
    }
    conn.close();
}

/// Feed `chunk` and submit every complete frame. Returns `false` when the
/// connection must stop reading.
async fn dispatch(
    conn: &Arc<Connection>,
    reassembler: &mut FrameReassembler,
    routes: &RouteTable,
    chunk: &[u8],
) -> bool {
    let feed = reassembler.feed(chunk);

    for discarded in &feed.discarded {
        metrics::inc_errors(ErrorKind::FrameTooLong);
        warn!(connection_id = %conn.id, error = %discarded, "discarded oversized frame");
    }

    for frame in feed.frames {
        metrics::inc_frames(Direction::Inbound);
        let message = match conn.codec.decode(frame) {
            Ok(message) => message,
            Err(e) => {
                metrics::inc_errors(ErrorKind::Decode);
                debug!(connection_id = %conn.id, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        let chain = routes.chain(message.event());
        let ctx = Context::new(Arc::clone(conn), Request::new(message), chain);
        let submitted = tokio::select! {
            biased;

            () = conn.token.cancelled() => return false,
            res = conn.worker.submit(ctx) => res,
        };
        if let Err(e) = submitted {
            debug!(connection_id = %conn.id, error = %e, "worker unavailable, closing");
            return false;
        }
    }

    if let Some(e) = feed.fatal {
        metrics::inc_errors(ErrorKind::Framing);
        warn!(connection_id = %conn.id, error = %e, "malformed frame stream, closing");
        return false;
    }
    true
}

/// Upper bound on the graceful close of the writing half.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Write queued frames in order until close or a write error.
///
/// Frames still queued when the connection closes are dropped. A write
/// blocked on a peer that stopped reading is abandoned on close and the
/// writing half is dropped without a close handshake.
pub(super) async fn write_loop(
    conn: Arc<Connection>,
    mut writer: Box<dyn TransportWriter>,
    mut outbound: mpsc::Receiver<Bytes>,
) {
    let mut graceful = true;
    loop {
        let frame = tokio::select! {
            biased;

            () = conn.token.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let written = tokio::select! {
            biased;

            () = conn.token.cancelled() => {
                debug!(connection_id = %conn.id, "write interrupted by close");
                graceful = false;
                break;
            }
            res = writer.write_frame(frame) => res,
        };
        if let Err(e) = written {
            metrics::inc_errors(ErrorKind::Transport);
            debug!(connection_id = %conn.id, error = %e, "transport write failed");
            graceful = false;
            break;
        }
        metrics::inc_frames(Direction::Outbound);
    }

    outbound.close();
    if graceful {
        match timeout(SHUTDOWN_GRACE, writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %conn.id, error = %e, "transport shutdown failed");
            }
            Err(_) => debug!(connection_id = %conn.id, "transport shutdown timed out"),
        }
    }
    drop(writer);
    conn.close();
}
