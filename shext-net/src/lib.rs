//! Ordered, reliable transport between two parties.
//!
//! A [`Connection`] wraps any tokio byte stream (TCP, an in-memory duplex
//! pipe, ...) and offers exact-length sends and receives of bytes and
//! [`Block`]s. Writes are buffered; pending writes are flushed before every
//! read so two parties alternating between sending and receiving can not
//! deadlock on a buffered message.
//!
//! Every send and receive emits a [`TRACE`](tracing::Level::TRACE) event on the
//! `shext_metrics` target containing the number of transferred bytes.
use std::{fmt, io};

use shext_core::Block;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf,
};
use tracing::{Level, event};

#[doc(hidden)]
#[cfg(any(test, feature = "__testing"))]
pub mod testing;

/// Size of the write buffer of a [`Connection`].
pub const WRITE_BUF_SIZE: usize = 64 * 1024;

type BoxedStream = Box<dyn Stream>;

/// Byte streams usable by a [`Connection`].
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> Stream for S {}

/// Error type returned by [`Connection`] operations.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("error in sending/receiving data")]
    Io(#[from] io::Error),
    #[error("connection closed by peer")]
    Closed,
}

/// Connection to the other party of a two-party protocol.
pub struct Connection {
    reader: ReadHalf<BoxedStream>,
    writer: BufWriter<WriteHalf<BoxedStream>>,
    bytes_written: u64,
    bytes_read: u64,
}

impl Connection {
    /// Create a new connection over a byte stream.
    pub fn new<S: Stream + 'static>(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(Box::new(stream) as BoxedStream);
        Self {
            reader,
            writer: BufWriter::with_capacity(WRITE_BUF_SIZE, writer),
            bytes_written: 0,
            bytes_read: 0,
        }
    }

    /// Send `bytes` to the other party.
    ///
    /// The bytes might stay buffered until the next [`Connection::flush`] or
    /// receive operation.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.writer.write_all(bytes).await?;
        self.bytes_written += bytes.len() as u64;
        event!(target: "shext_metrics", Level::TRACE, bytes_written = bytes.len());
        Ok(())
    }

    /// Send `blocks` to the other party.
    pub async fn send_blocks(&mut self, blocks: &[Block]) -> Result<(), ConnectionError> {
        self.send_bytes(bytemuck::cast_slice(blocks)).await
    }

    /// Receive exactly `buf.len()` bytes.
    ///
    /// Returns [`ConnectionError::Closed`] if the other party closes the
    /// connection before enough bytes are received.
    pub async fn recv_bytes_into(&mut self, buf: &mut [u8]) -> Result<(), ConnectionError> {
        self.flush().await?;
        match self.reader.read_exact(buf).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ConnectionError::Closed);
            }
            Err(err) => return Err(err.into()),
        }
        self.bytes_read += buf.len() as u64;
        event!(target: "shext_metrics", Level::TRACE, bytes_read = buf.len());
        Ok(())
    }

    /// Receive exactly `blocks.len()` blocks.
    pub async fn recv_blocks_into(&mut self, blocks: &mut [Block]) -> Result<(), ConnectionError> {
        self.recv_bytes_into(bytemuck::cast_slice_mut(blocks)).await
    }

    /// Flush buffered writes to the underlying stream.
    pub async fn flush(&mut self) -> Result<(), ConnectionError> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write half. The other party will observe
    /// [`ConnectionError::Closed`] on its next receive.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Total number of bytes sent over this connection.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total number of bytes received over this connection.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("bytes_written", &self.bytes_written)
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}
