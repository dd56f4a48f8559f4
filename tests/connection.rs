//! Connection lifecycle tests through the public server API.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use eventwire::{Router, SendError, Server, ServerConfig};
use eventwire_testing::{TestClient, TestResult, TestServer, recv_expect, test_config, unused_listener};
use rstest::rstest;
use tokio::io::{AsyncReadExt, duplex};

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_close_runs_hook_once(test_config: ServerConfig) -> TestResult {
    let closed = Arc::new(AtomicUsize::new(0));
    let server = Server::new(test_config, Router::new())?
        .bind_existing_listener(unused_listener()?)?
        .on_connection_close({
            let closed = Arc::clone(&closed);
            move |_| {
                closed.fetch_add(1, Ordering::SeqCst);
            }
        });
    let server = TestServer::spawn(server).await?;
    let (mut client, stream) = duplex(256);
    let id = server.handle().attach_stream(stream, None)?;
    let conn = server.registry().get(id).expect("registered");

    let closers: Vec<_> = (0..16)
        .map(|_| {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.close() })
        })
        .collect();
    for closer in closers {
        closer.await?;
    }

    assert!(conn.is_closed());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(server.registry().get(id).is_none());
    let mut buf = [0u8; 1];
    assert_eq!(client.read(&mut buf).await?, 0);
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn server_can_push_to_registered_connection(test_config: ServerConfig) -> TestResult {
    let server = TestServer::start(test_config, Router::new()).await?;
    let mut client = TestClient::connect(server.addr()).await?;
    assert!(server.wait_for_connections(1, Duration::from_secs(1)).await);

    let id = server.registry().ids()[0];
    let conn = server.registry().get(id).expect("registered");
    conn.send_message(42, "notice").await?;

    let pushed = recv_expect!(client.recv());
    assert_eq!(pushed.event(), 42);
    assert_eq!(pushed.body().as_ref(), b"notice");
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn send_after_peer_leaves_is_rejected(test_config: ServerConfig) -> TestResult {
    let server = TestServer::start(test_config, Router::new()).await?;
    let (client, stream) = duplex(256);
    let id = server.handle().attach_stream(stream, None)?;
    let conn = server.registry().get(id).expect("registered");

    drop(client);
    assert!(server.wait_for_connections(0, Duration::from_secs(1)).await);

    assert_eq!(conn.send_message(1, "late").await, Err(SendError::Closed));
    assert_eq!(conn.try_send_message(1, "late"), Err(SendError::Closed));
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn ids_are_unique_and_increasing(test_config: ServerConfig) -> TestResult {
    let server = TestServer::start(test_config, Router::new()).await?;
    let mut ids = Vec::new();
    let mut clients = Vec::new();
    for _ in 0..5 {
        let (client, stream) = duplex(64);
        clients.push(client);
        ids.push(server.handle().attach_stream(stream, None)?.as_u64());
    }

    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(server.registry().len(), 5);
    server.shutdown().await
}
