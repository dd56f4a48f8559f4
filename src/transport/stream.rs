//! Byte-stream transport for TCP and any other `AsyncRead + AsyncWrite`.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::{Inbound, Transport, TransportKind, TransportReader, TransportWriter};

/// Reads into a fixed buffer of at most `max_read_buffer_size` bytes.
pub struct StreamReader<S> {
    inner: ReadHalf<S>,
    buf: Box<[u8]>,
}

/// Writes whole frames to a byte stream.
pub struct StreamWriter<S> {
    inner: WriteHalf<S>,
}

/// Split `stream` into transport halves.
///
/// A zero `read_buffer_size` is raised to one byte so reads always make
/// progress.
pub fn split<S>(stream: S, read_buffer_size: usize) -> (StreamReader<S>, StreamWriter<S>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    (
        StreamReader {
            inner: read,
            buf: vec![0; read_buffer_size.max(1)].into_boxed_slice(),
        },
        StreamWriter { inner: write },
    )
}

impl Transport {
    /// Wrap a byte stream as a transport of the given kind.
    pub fn from_stream<S>(
        kind: TransportKind,
        stream: S,
        peer: Option<SocketAddr>,
        read_buffer_size: usize,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = split(stream, read_buffer_size);
        Self::new(kind, peer, reader, writer)
    }
}

#[async_trait]
impl<S> TransportReader for StreamReader<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read_chunk(&mut self) -> io::Result<Inbound> {
        let n = self.inner.read(&mut self.buf).await?;
        if n == 0 {
            return Ok(Inbound::Eof);
        }
        Ok(Inbound::Data(Bytes::copy_from_slice(&self.buf[..n])))
    }
}

#[async_trait]
impl<S> TransportWriter for StreamWriter<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn write_frame(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner.write_all(&frame).await?;
        self.inner.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> { self.inner.shutdown().await }
}
