//! End-to-end tests driving a running server over TCP.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use eventwire::{
    Router,
    Server,
    ServerConfig,
    handler_fn,
    message::{NOT_FOUND, SERVER_ERROR},
    middleware::Recovery,
    server::WorkerMode,
};
use eventwire_testing::{TestClient, TestResult, TestServer, recv_expect, test_config, unused_listener};
use rstest::{fixture, rstest};

const PING: u32 = 0;
const ECHO: u32 = 1;
const PANIC: u32 = 5;

fn ping() -> impl eventwire::Handler {
    handler_fn(|ctx| {
        Box::pin(async move {
            let _ = ctx.send(PING, "pong").await;
        })
    })
}

fn with_routes(router: Router) -> Router {
    router
        .route(PING, ping())
        .route(
            ECHO,
            handler_fn(|ctx| {
                Box::pin(async move {
                    // Later requests finish faster; replies must still keep order.
                    let delay = 3 - u64::from(ctx.request().body()[0] % 4);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    let body = ctx.request().body().clone();
                    let _ = ctx.send(ECHO, body).await;
                })
            }),
        )
        .route(
            PANIC,
            handler_fn(|_| {
                Box::pin(async {
                    panic!("boom");
                })
            }),
        )
}

#[fixture]
fn router() -> Router { with_routes(Router::new()) }

#[rstest]
#[tokio::test]
async fn ping_is_answered(test_config: ServerConfig, router: Router) -> TestResult {
    let server = TestServer::start(test_config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;

    client.send(PING, "ping").await?;
    let reply = recv_expect!(client.recv());

    assert_eq!(reply.event(), PING);
    assert_eq!(reply.body().as_ref(), b"pong");
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn unknown_event_gets_not_found(test_config: ServerConfig, router: Router) -> TestResult {
    let server = TestServer::start(test_config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;

    client.send(999, "").await?;
    let reply = recv_expect!(client.recv());

    assert_eq!(reply.event(), NOT_FOUND);
    assert_eq!(reply.body().as_ref(), b"Event Not Found");
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn recovery_reports_panic_and_keeps_serving(test_config: ServerConfig) -> TestResult {
    let router = with_routes(Router::new().wrap(Recovery));
    let server = TestServer::start(test_config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;

    client.send(PANIC, "").await?;
    let reply = recv_expect!(client.recv());
    assert_eq!(reply.event(), SERVER_ERROR);
    assert_eq!(reply.body().as_ref(), b"Server Error");

    client.send(PING, "").await?;
    assert_eq!(recv_expect!(client.recv()).event(), PING);
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn panic_without_recovery_leaves_worker_running(router: Router) -> TestResult {
    let config = ServerConfig {
        worker_mode: WorkerMode::Pool { workers: 1 },
        ..test_config()
    };
    let server = TestServer::start(config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;

    client.send(PANIC, "").await?;
    client.send(PING, "").await?;
    let reply = recv_expect!(client.recv());

    assert_eq!(reply.event(), PING, "no reply for the panicking request");
    server.shutdown().await
}

#[rstest]
#[case::pool(WorkerMode::Pool { workers: 4 })]
#[case::dedicated(WorkerMode::Dedicated)]
#[tokio::test]
async fn replies_keep_request_order(#[case] worker_mode: WorkerMode, router: Router) -> TestResult {
    let config = ServerConfig {
        worker_mode,
        ..test_config()
    };
    let server = TestServer::start(config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;

    for i in 0..32u8 {
        client.send(ECHO, vec![i]).await?;
    }
    let mut seen = Vec::new();
    for _ in 0..32 {
        seen.push(recv_expect!(client.recv()).body()[0]);
    }

    assert_eq!(seen, (0..32).collect::<Vec<u8>>());
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn connections_beyond_limit_are_closed(router: Router) -> TestResult {
    let config = ServerConfig {
        max_connections: 3,
        ..test_config()
    };
    let server = TestServer::start(config, router).await?;

    let mut admitted = Vec::new();
    for _ in 0..3 {
        admitted.push(TestClient::connect(server.addr()).await?);
    }
    assert!(server.wait_for_connections(3, Duration::from_secs(1)).await);

    let mut refused = TestClient::connect(server.addr()).await?;
    refused.wait_closed(Duration::from_secs(1)).await?;
    assert_eq!(server.registry().len(), 3);

    for client in &mut admitted {
        client.send(PING, "").await?;
        assert_eq!(recv_expect!(client.recv()).event(), PING);
    }
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn closed_client_slot_is_reused(router: Router) -> TestResult {
    let config = ServerConfig {
        max_connections: 1,
        ..test_config()
    };
    let server = TestServer::start(config, router).await?;

    let mut first = TestClient::connect(server.addr()).await?;
    assert!(server.wait_for_connections(1, Duration::from_secs(1)).await);
    first.finish().await?;
    assert!(server.wait_for_connections(0, Duration::from_secs(1)).await);

    let mut second = TestClient::connect(server.addr()).await?;
    second.send(PING, "").await?;
    assert_eq!(recv_expect!(second.recv()).event(), PING);
    server.shutdown().await
}

#[rstest]
#[tokio::test]
async fn shutdown_closes_every_connection(test_config: ServerConfig, router: Router) -> TestResult {
    let server = TestServer::start(test_config, router).await?;
    let registry = Arc::clone(server.registry());
    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(TestClient::connect(server.addr()).await?);
    }
    assert!(server.wait_for_connections(4, Duration::from_secs(1)).await);

    server.shutdown().await?;

    for client in &mut clients {
        client.wait_closed(Duration::from_secs(1)).await?;
    }
    assert!(registry.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn hooks_run_once_per_connection(test_config: ServerConfig, router: Router) -> TestResult {
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let server = Server::new(test_config, router)?
        .bind_existing_listener(unused_listener()?)?
        .on_connection_open({
            let opened = Arc::clone(&opened);
            move |_| {
                opened.fetch_add(1, Ordering::SeqCst);
            }
        })
        .on_connection_close({
            let closed = Arc::clone(&closed);
            move |conn| {
                assert!(conn.is_closed());
                closed.fetch_add(1, Ordering::SeqCst);
            }
        });
    let server = TestServer::spawn(server).await?;

    let mut client = TestClient::connect(server.addr()).await?;
    client.send(PING, "").await?;
    recv_expect!(client.recv());
    client.finish().await?;
    assert!(server.wait_for_connections(0, Duration::from_secs(1)).await);

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    server.shutdown().await?;
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn shutdown_completes_while_peer_stops_reading(router: Router) -> TestResult {
    const FLOOD: u32 = 6;
    let config = ServerConfig {
        worker_mode: WorkerMode::Pool { workers: 2 },
        outbound_queue_size: 512,
        ..test_config()
    };
    let router = router.route(
        FLOOD,
        handler_fn(|ctx| {
            Box::pin(async move {
                let chunk = bytes::Bytes::from(vec![0u8; 64 * 1024]);
                for _ in 0..400 {
                    if ctx.connection().try_send_message(FLOOD, chunk.clone()).is_err() {
                        break;
                    }
                }
            })
        }),
    );
    let server = TestServer::start(config, router).await?;
    let mut client = TestClient::connect(server.addr()).await?;
    client.send(FLOOD, "").await?;
    // Let the socket buffers fill while the client never reads.
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(5), server.shutdown()).await??;
    client.wait_closed(Duration::from_secs(1)).await?;
    Ok(())
}
