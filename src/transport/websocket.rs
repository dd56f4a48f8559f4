//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Every binary or text message is treated as a chunk of the same byte stream
//! a TCP peer would send, so message boundaries on the WebSocket layer do not
//! need to line up with frames. Ping and pong messages only prove liveness and
//! a close message ends the stream.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    accept_hdr_async_with_config,
    tungstenite::{
        Error as WsError,
        Message as WsMessage,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::WebSocketConfig,
    },
};

use super::{Inbound, Transport, TransportKind, TransportReader, TransportWriter};

/// Reading half of a WebSocket session.
pub struct WebSocketReader<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Writing half of a WebSocket session; frames are sent as binary messages.
pub struct WebSocketWriter<S> {
    inner: SplitSink<WebSocketStream<S>, WsMessage>,
}

/// Session limits derived from the largest accepted read.
///
/// A single WebSocket message is one read, so neither a message nor any of
/// its fragments may exceed `max_read_buffer_size`.
fn session_config(max_read_buffer_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_read_buffer_size);
    config.max_frame_size = Some(max_read_buffer_size);
    config
}

/// Perform the server side of the upgrade handshake on `stream`.
///
/// Requests for any path other than `path` are answered with `404 Not Found`
/// and fail the handshake. Messages larger than `max_read_buffer_size` fail
/// the session with a read error.
///
/// # Errors
///
/// Returns an [`io::Error`] if the handshake fails or the path is rejected.
pub async fn accept<S>(
    stream: S,
    path: &str,
    peer: Option<SocketAddr>,
    max_read_buffer_size: usize,
) -> io::Result<Transport>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let expected = path.to_owned();
    let check_path = move |request: &Request, response: Response| {
        if request.uri().path() == expected {
            return Ok(response);
        }
        debug!(
            "websocket upgrade rejected: path={}, peer={peer:?}",
            request.uri().path()
        );
        let mut rejection = ErrorResponse::new(Some("Not Found".to_owned()));
        *rejection.status_mut() = StatusCode::NOT_FOUND;
        Err(rejection)
    };

    let config = session_config(max_read_buffer_size);
    let ws = accept_hdr_async_with_config(stream, check_path, Some(config))
        .await
        .map_err(io::Error::other)?;
    Ok(Transport::from_websocket(ws, peer))
}

impl Transport {
    /// Wrap an upgraded WebSocket session as a transport.
    pub fn from_websocket<S>(ws: WebSocketStream<S>, peer: Option<SocketAddr>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self::new(
            TransportKind::WebSocket,
            peer,
            WebSocketReader { inner: stream },
            WebSocketWriter { inner: sink },
        )
    }
}

#[async_trait]
impl<S> TransportReader for WebSocketReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_chunk(&mut self) -> io::Result<Inbound> {
        match self.inner.next().await {
            None | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                Ok(Inbound::Eof)
            }
            Some(Err(e)) => Err(io::Error::other(e)),
            Some(Ok(message)) => Ok(match message {
                WsMessage::Binary(data) => Inbound::Data(Bytes::from(data)),
                WsMessage::Text(text) => Inbound::Data(Bytes::from(text.into_bytes())),
                WsMessage::Close(_) => Inbound::Eof,
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                    Inbound::KeepAlive
                }
            }),
        }
    }
}

#[async_trait]
impl<S> TransportWriter for WebSocketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner
            .send(WsMessage::Binary(frame.to_vec()))
            .await
            .map_err(io::Error::other)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(io::Error::other(e)),
        }
    }
}
