use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::transport::{FrameReader, FrameWriter};

/// Largest frame accepted in either direction (100MB)
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Reading half of a length-prefixed stream
///
/// Messages are read as a 4-byte big-endian length prefix followed by data
pub struct FramedReader<R> {
    inner: R,
}

impl<R> FramedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

fn eof_as_closed(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

#[async_trait::async_trait]
impl<R: AsyncRead + Unpin + Send> FrameReader for FramedReader<R> {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let len = self.inner.read_u32().await.map_err(eof_as_closed)? as usize;

        if len > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        let mut buf = vec![0u8; len];
        self.inner
            .read_exact(&mut buf)
            .await
            .map_err(eof_as_closed)?;

        Ok(buf)
    }
}

/// Writing half of a length-prefixed stream
pub struct FramedWriter<W> {
    inner: W,
    send_timeout: Option<Duration>,
}

impl<W> FramedWriter<W> {
    pub fn new(inner: W, send_timeout: Option<Duration>) -> Self {
        Self {
            inner,
            send_timeout,
        }
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameWriter for FramedWriter<W> {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                bytes.len()
            )));
        }

        let send_op = async {
            self.inner.write_u32(bytes.len() as u32).await?;
            self.inner.write_all(bytes).await?;
            self.inner.flush().await?;

            Ok::<(), Error>(())
        };

        if let Some(timeout) = self.send_timeout {
            tokio::time::timeout(timeout, send_op)
                .await
                .map_err(|_| Error::Timeout("Send"))?
        } else {
            send_op.await
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_keep_their_boundaries() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FramedWriter::new(a, None);
        let mut reader = FramedReader::new(b);

        writer.send(b"first").await.unwrap();
        writer.send(b"").await.unwrap();
        writer.send(b"third").await.unwrap();

        assert_eq!(reader.receive().await.unwrap(), b"first");
        assert_eq!(reader.receive().await.unwrap(), b"");
        assert_eq!(reader.receive().await.unwrap(), b"third");
    }

    #[tokio::test]
    async fn eof_reads_as_connection_closed() {
        let (a, b) = tokio::io::duplex(64);
        let mut writer = FramedWriter::new(a, None);
        let mut reader = FramedReader::new(b);

        writer.close().await.unwrap();
        match reader.receive().await {
            Err(Error::ConnectionClosed) => {}
            other => panic!("Expected ConnectionClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut a, b) = tokio::io::duplex(64);
        let mut reader = FramedReader::new(b);

        a.write_u32(200 * 1024 * 1024).await.unwrap();
        match reader.receive().await {
            Err(Error::InvalidFrame(msg)) => assert!(msg.contains("too large")),
            other => panic!("Expected InvalidFrame, got {:?}", other),
        }
    }
}
