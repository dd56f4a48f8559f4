//! Minimal clients speaking the default wire format.

use std::{collections::VecDeque, io, net::SocketAddr, time::Duration};

use bytes::Bytes;
use eventwire::{
    LittleEndianCodec,
    Message,
    MessageCodec,
    frame::{FrameConfig, FrameReassembler},
};
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};

use crate::frames::encode_message;

/// How long [`TestClient::recv`] and [`WsTestClient::recv`] wait for a reply.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Turns raw chunks into decoded messages.
#[derive(Debug)]
struct Inbox {
    reassembler: FrameReassembler,
    codec: LittleEndianCodec,
    ready: VecDeque<Bytes>,
}

impl Inbox {
    fn new() -> Self {
        Self {
            reassembler: FrameReassembler::new(FrameConfig::default())
                .expect("default frame config is valid"),
            codec: LittleEndianCodec::default(),
            ready: VecDeque::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> io::Result<()> {
        let feed = self
            .reassembler
            .feed(chunk)
            .into_result()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.ready.extend(feed.frames);
        Ok(())
    }

    fn pop(&mut self) -> io::Result<Option<Message>> {
        self.ready
            .pop_front()
            .map(|frame| {
                self.codec
                    .decode(frame)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .transpose()
    }
}

fn timed_out() -> io::Error { io::Error::new(io::ErrorKind::TimedOut, "no reply in time") }

/// TCP client that sends encoded messages and reassembles replies.
#[derive(Debug)]
pub struct TestClient {
    stream: TcpStream,
    inbox: Inbox,
}

impl TestClient {
    /// Connect to a server's TCP listener.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while connecting.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            inbox: Inbox::new(),
        })
    }

    /// Encode and send one message.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while writing.
    pub async fn send(&mut self, event: u32, body: impl Into<Bytes>) -> io::Result<()> {
        self.send_raw(&encode_message(event, body)).await
    }

    /// Write raw bytes, which need not contain whole frames.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while writing.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Receive the next message, or `None` once the server closes the stream.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if nothing arrives within
    /// [`DEFAULT_RECV_TIMEOUT`] and [`io::ErrorKind::InvalidData`] for replies
    /// that cannot be decoded.
    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        self.recv_timeout(DEFAULT_RECV_TIMEOUT).await
    }

    /// Receive the next message, waiting at most `limit`.
    ///
    /// # Errors
    ///
    /// See [`recv`](Self::recv).
    pub async fn recv_timeout(&mut self, limit: Duration) -> io::Result<Option<Message>> {
        timeout(limit, self.next_message())
            .await
            .map_err(|_| timed_out())?
    }

    async fn next_message(&mut self) -> io::Result<Option<Message>> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(message) = self.inbox.pop()? {
                return Ok(Some(message));
            }
            match self.stream.read(&mut buf).await {
                Ok(0) => return Ok(None),
                Ok(n) => self.inbox.push(&buf[..n])?,
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait until the server closes the connection, discarding any replies.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if the stream is still open after
    /// `limit`.
    pub async fn wait_closed(&mut self, limit: Duration) -> io::Result<()> {
        timeout(limit, async {
            while self.next_message().await?.is_some() {}
            Ok(())
        })
        .await
        .map_err(|_| timed_out())?
    }

    /// Close the write half so the server observes end of stream.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while shutting the socket down.
    pub async fn finish(&mut self) -> io::Result<()> { self.stream.shutdown().await }
}

/// WebSocket client that sends each encoded message as one binary frame.
#[derive(Debug)]
pub struct WsTestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    inbox: Inbox,
}

impl WsTestClient {
    /// Open a WebSocket session at `ws://{addr}{path}`.
    ///
    /// # Errors
    ///
    /// Returns the handshake error, including [`WsError::Http`] when the
    /// server refuses the path.
    pub async fn connect(addr: SocketAddr, path: &str) -> Result<Self, WsError> {
        let (ws, _) = connect_async(format!("ws://{addr}{path}")).await?;
        Ok(Self {
            ws,
            inbox: Inbox::new(),
        })
    }

    /// Encode and send one message.
    ///
    /// # Errors
    ///
    /// Returns any WebSocket error raised while sending.
    pub async fn send(&mut self, event: u32, body: impl Into<Bytes>) -> Result<(), WsError> {
        self.send_raw(&encode_message(event, body)).await
    }

    /// Send raw bytes as a single binary WebSocket message.
    ///
    /// # Errors
    ///
    /// Returns any WebSocket error raised while sending.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), WsError> {
        self.ws.send(WsMessage::Binary(bytes.to_vec())).await
    }

    /// Receive the next message, or `None` once the session closes.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::TimedOut`] if nothing arrives within
    /// [`DEFAULT_RECV_TIMEOUT`].
    pub async fn recv(&mut self) -> io::Result<Option<Message>> {
        timeout(DEFAULT_RECV_TIMEOUT, self.next_message())
            .await
            .map_err(|_| timed_out())?
    }

    async fn next_message(&mut self) -> io::Result<Option<Message>> {
        loop {
            if let Some(message) = self.inbox.pop()? {
                return Ok(Some(message));
            }
            match self.ws.next().await {
                None
                | Some(Ok(WsMessage::Close(_)))
                | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Ok(WsMessage::Binary(data))) => self.inbox.push(&data)?,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(io::Error::other(e)),
            }
        }
    }

    /// Send a close frame.
    ///
    /// # Errors
    ///
    /// Returns any WebSocket error other than the session already being
    /// closed.
    pub async fn close(&mut self) -> Result<(), WsError> {
        match self.ws.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
