//! Tests for connection state, sending and the reader/writer loops.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rstest::rstest;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    time::{sleep, timeout},
};
use tokio_util::task::TaskTracker;
use tracing::Span;
use tracing_test::traced_test;

use super::{
    ConnectionHooks,
    ConnectionId,
    ConnectionIo,
    SendError,
    test_support::{TestConnectionBuilder, test_connection},
};
use crate::{
    codec::{CodecError, LittleEndianCodec, MessageCodec},
    frame::{Endianness, FrameConfig, FrameReassembler},
    heartbeat::Heartbeat,
    message::Message,
    registry::ConnectionRegistry,
    router::Router,
    transport::{Transport, TransportKind},
};

fn encode(event: u32, body: &'static str) -> bytes::Bytes {
    LittleEndianCodec::default()
        .encode(&Message::new(event, body))
        .expect("encode")
}

#[test]
fn connection_id_round_trips_and_displays() {
    let id = ConnectionId::from(42);
    assert_eq!(id.as_u64(), 42);
    assert_eq!(id, ConnectionId::new(42));
    assert_eq!(id.to_string(), "42");
}

#[tokio::test]
async fn send_message_queues_encoded_frame() {
    let mut t = test_connection(1);
    t.connection.send_message(3, "hey").await.expect("send");

    let frame = t.outbound.recv().await.expect("frame");
    assert_eq!(frame, encode(3, "hey"));
}

#[tokio::test]
async fn send_after_close_is_rejected() {
    let t = test_connection(1);
    t.connection.close();

    assert_eq!(t.connection.send_message(1, "x").await, Err(SendError::Closed));
    assert_eq!(t.connection.try_send_message(1, "x"), Err(SendError::Closed));
}

#[tokio::test]
async fn try_send_reports_full_queue() {
    let t = TestConnectionBuilder::default().queue_size(1).build();
    t.connection.try_send_message(1, "a").expect("first send");

    assert_eq!(t.connection.try_send_message(1, "b"), Err(SendError::QueueFull));
}

#[tokio::test(start_paused = true)]
async fn blocked_send_times_out() {
    let t = TestConnectionBuilder::default()
        .queue_size(1)
        .send_timeout(Some(Duration::from_secs(2)))
        .build();
    t.connection.send_message(1, "a").await.expect("first send");

    assert_eq!(t.connection.send_message(1, "b").await, Err(SendError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn blocked_send_returns_when_connection_closes() {
    let t = TestConnectionBuilder::default()
        .queue_size(1)
        .send_timeout(None)
        .build();
    t.connection.send_message(1, "a").await.expect("first send");

    let conn = Arc::clone(&t.connection);
    let pending = tokio::spawn(async move { conn.send_message(1, "b").await });
    sleep(Duration::from_millis(10)).await;
    t.connection.close();

    let result = pending.await.expect("join");
    assert_eq!(result, Err(SendError::Closed));
}

#[tokio::test]
async fn close_runs_hook_once_and_deregisters() {
    let registry = Arc::new(ConnectionRegistry::new(4));
    let calls = Arc::new(AtomicUsize::new(0));
    let seen_closed = Arc::new(AtomicUsize::new(0));
    let hooks = ConnectionHooks {
        on_open: None,
        on_close: Some(Arc::new({
            let calls = Arc::clone(&calls);
            let seen_closed = Arc::clone(&seen_closed);
            move |conn| {
                calls.fetch_add(1, Ordering::SeqCst);
                if conn.is_closed() {
                    seen_closed.fetch_add(1, Ordering::SeqCst);
                }
            }
        })),
    };
    let t = TestConnectionBuilder::default()
        .id(9)
        .hooks(hooks)
        .registry(&registry)
        .build();
    registry.add(Arc::clone(&t.connection));
    assert_eq!(registry.len(), 1);

    let token = t.connection.closed_token();
    t.connection.close();
    t.connection.close();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen_closed.load(Ordering::SeqCst), 1);
    assert!(token.is_cancelled());
    assert!(registry.get(ConnectionId::new(9)).is_none());
    assert!(registry.is_empty());
}

#[traced_test]
#[tokio::test]
async fn panicking_close_hook_does_not_abort_close() {
    let hooks = ConnectionHooks {
        on_open: None,
        on_close: Some(Arc::new(|_| panic!("hook failure"))),
    };
    let t = TestConnectionBuilder::default().hooks(hooks).build();
    t.connection.close();

    assert!(t.connection.is_closed());
    assert!(t.connection.closed_token().is_cancelled());
    assert!(logs_contain("connection hook panicked"));
    assert!(logs_contain("hook failure"));
}

#[rstest]
#[case(Duration::from_secs(5), Duration::from_secs(5))]
#[case(Duration::from_millis(1500), Duration::from_millis(1500))]
#[tokio::test(start_paused = true)]
async fn idle_time_tracks_last_touch(#[case] wait: Duration, #[case] expected: Duration) {
    let t = test_connection(1);
    t.connection.touch();
    sleep(wait).await;
    assert_eq!(t.connection.idle_for(), expected);

    t.connection.touch();
    assert_eq!(t.connection.idle_for(), Duration::ZERO);
}

#[tokio::test]
async fn open_connection_dispatches_frames_and_writes_replies() {
    let opened = Arc::new(AtomicUsize::new(0));
    let hooks = ConnectionHooks {
        on_open: Some(Arc::new({
            let opened = Arc::clone(&opened);
            move |_| {
                opened.fetch_add(1, Ordering::SeqCst);
            }
        })),
        on_close: None,
    };
    let t = TestConnectionBuilder::default().id(5).hooks(hooks).build();
    let mut submitted = t.submitted;
    let (mut client, server) = tokio::io::duplex(256);
    let transport = Transport::from_stream(TransportKind::Stream, server, None, 16);
    let tracker = TaskTracker::new();

    t.connection.open(
        ConnectionIo {
            reader: transport.reader,
            writer: transport.writer,
            outbound: t.outbound,
            reassembler: FrameReassembler::new(FrameConfig::default()).expect("config"),
            routes: Arc::new(Router::new().into_table()),
            heartbeat: Heartbeat::new(Duration::from_secs(60), Duration::from_secs(120)),
        },
        &tracker,
        &Span::none(),
    );
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    let mut wire = encode(7, "first").to_vec();
    wire.extend_from_slice(&encode(8, "second"));
    client.write_all(&wire).await.expect("write");

    let first = submitted.recv().await.expect("first context");
    let second = submitted.recv().await.expect("second context");
    assert_eq!(first.request().event(), 7);
    assert_eq!(first.request().body().as_ref(), b"first");
    assert_eq!(second.request().event(), 8);
    assert_eq!(first.chain_len(), 1);
    drop((first, second));

    t.connection.send_message(1, "ok").await.expect("send");
    let expected = encode(1, "ok");
    let mut reply = vec![0; expected.len()];
    client.read_exact(&mut reply).await.expect("read reply");
    assert_eq!(reply, expected.as_ref());

    drop(client);
    timeout(Duration::from_secs(1), t.connection.closed_token().cancelled())
        .await
        .expect("connection closes on peer EOF");
    assert!(t.connection.is_closed());

    tracker.close();
    timeout(Duration::from_secs(1), tracker.wait())
        .await
        .expect("connection tasks finish");
}

#[tokio::test]
async fn malformed_stream_closes_connection() {
    let t = test_connection(2);
    let (mut client, server) = tokio::io::duplex(64);
    let transport = Transport::from_stream(TransportKind::Stream, server, None, 64);
    let tracker = TaskTracker::new();
    let config = FrameConfig {
        length_adjustment: -16,
        ..FrameConfig::default()
    };

    t.connection.open(
        ConnectionIo {
            reader: transport.reader,
            writer: transport.writer,
            outbound: t.outbound,
            reassembler: FrameReassembler::new(config).expect("config"),
            routes: Arc::new(Router::new().into_table()),
            heartbeat: Heartbeat::new(Duration::from_secs(60), Duration::from_secs(120)),
        },
        &tracker,
        &Span::none(),
    );

    client.write_all(&encode(1, "x")).await.expect("write");
    timeout(Duration::from_secs(1), t.connection.closed_token().cancelled())
        .await
        .expect("connection closes on framing error");
}

/// Treats every frame as the body of event 0.
struct BodyOnlyCodec;

impl MessageCodec for BodyOnlyCodec {
    fn encode(&self, message: &Message) -> Result<bytes::Bytes, CodecError> {
        Ok(message.body().clone())
    }

    fn decode(&self, frame: bytes::Bytes) -> Result<Message, CodecError> {
        Ok(Message::new(0, frame))
    }
}

#[tokio::test]
async fn frames_ahead_of_a_malformed_one_are_dispatched() {
    let t = TestConnectionBuilder::default()
        .id(3)
        .codec(BodyOnlyCodec)
        .build();
    let mut submitted = t.submitted;
    let (mut client, server) = tokio::io::duplex(64);
    let transport = Transport::from_stream(TransportKind::Stream, server, None, 64);
    let tracker = TaskTracker::new();
    let config = FrameConfig {
        byte_order: Endianness::Big,
        length_field_offset: 0,
        length_field_length: 8,
        length_adjustment: 0,
        initial_bytes_to_strip: 8,
        ..FrameConfig::default()
    };

    t.connection.open(
        ConnectionIo {
            reader: transport.reader,
            writer: transport.writer,
            outbound: t.outbound,
            reassembler: FrameReassembler::new(config).expect("config"),
            routes: Arc::new(Router::new().into_table()),
            heartbeat: Heartbeat::new(Duration::from_secs(60), Duration::from_secs(120)),
        },
        &tracker,
        &Span::none(),
    );

    let mut wire = 2u64.to_be_bytes().to_vec();
    wire.extend_from_slice(b"ok");
    wire.extend_from_slice(&[0xFF; 8]);
    client.write_all(&wire).await.expect("write");

    let ctx = timeout(Duration::from_secs(1), submitted.recv())
        .await
        .expect("valid frame submitted")
        .expect("context");
    assert_eq!(ctx.request().body().as_ref(), b"ok");
    timeout(Duration::from_secs(1), t.connection.closed_token().cancelled())
        .await
        .expect("connection closes on framing error");
}

#[tokio::test]
async fn close_abandons_a_write_the_peer_never_reads() {
    let t = test_connection(4);
    let (client, server) = tokio::io::duplex(64);
    let transport = Transport::from_stream(TransportKind::Stream, server, None, 64);
    let tracker = TaskTracker::new();

    t.connection.open(
        ConnectionIo {
            reader: transport.reader,
            writer: transport.writer,
            outbound: t.outbound,
            reassembler: FrameReassembler::new(FrameConfig::default()).expect("config"),
            routes: Arc::new(Router::new().into_table()),
            heartbeat: Heartbeat::new(Duration::from_secs(60), Duration::from_secs(120)),
        },
        &tracker,
        &Span::none(),
    );

    t.connection
        .send_message(1, vec![0u8; 4096])
        .await
        .expect("queued");
    sleep(Duration::from_millis(20)).await;
    assert!(!t.connection.is_closed());

    t.connection.close();
    tracker.close();
    timeout(Duration::from_secs(1), tracker.wait())
        .await
        .expect("stalled writer released on close");
    drop(client);
}
