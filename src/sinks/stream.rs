//! Sink over any async byte stream

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;

use super::Sink;

/// Write half of an accepted TCP connection
pub type TcpSink = StreamSink<OwnedWriteHalf>;

/// Writes each notification to an [`AsyncWrite`] and flushes it
pub struct StreamSink<W> {
    writer: W,
    kind: &'static str,
}

impl<W> StreamSink<W> {
    pub fn new(writer: W, kind: &'static str) -> Self {
        Self { writer, kind }
    }
}

impl StreamSink<OwnedWriteHalf> {
    pub fn tcp(writer: OwnedWriteHalf) -> Self {
        Self::new(writer, "tcp")
    }
}

#[async_trait]
impl<W> Sink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_writes_reach_reader() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut sink = StreamSink::new(server, "duplex");

        sink.write(b"Door changed state to on\n").await.unwrap();
        sink.close().await.unwrap();

        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "Door changed state to on\n");
        assert_eq!(sink.kind(), "duplex");
    }

    #[tokio::test]
    async fn test_write_fails_after_peer_gone() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = StreamSink::new(server, "duplex");
        drop(client);

        let err = sink.write(b"Door changed state to off\n").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
