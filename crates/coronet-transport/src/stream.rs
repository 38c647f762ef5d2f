//! [`Connection`] implementation over any split async byte stream.
//!
//! `StreamConnection` carries the dual failure policy for all stream
//! transports: timeouts bubble up without side effects, every other I/O
//! error disconnects first. TCP and the in-memory fabric are both thin
//! wrappers around this type.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use coronet_protocol::DeviceId;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::connection::{Connection, ConnectionId, DisconnectLatch, DisconnectNotice};
use crate::error::{Error, Result};

/// Default per-operation I/O timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Connection`] over a split async read/write pair.
pub struct StreamConnection<R, W> {
    id: ConnectionId,
    remote: DeviceId,
    reader: Mutex<R>,
    writer: Mutex<W>,
    io_timeout: Duration,
    latch: DisconnectLatch,
}

impl<R, W> StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a connected read/write pair bound to `remote`.
    pub fn new(remote: DeviceId, reader: R, writer: W, io_timeout: Duration) -> Self {
        Self {
            id: ConnectionId::next(),
            remote,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            io_timeout,
            latch: DisconnectLatch::new(),
        }
    }

    fn notice(&self) -> DisconnectNotice {
        DisconnectNotice {
            connection: self.id,
            device: self.remote.clone(),
        }
    }

    /// Map an operation result through the failure policy.
    fn settle<T>(&self, result: std::result::Result<std::io::Result<T>, tokio::time::error::Elapsed>) -> Result<T> {
        match result {
            // Timeout: transient, connection stays up.
            Err(_elapsed) => Err(Error::Timeout),
            Ok(Ok(value)) => Ok(value),
            // Any other I/O failure: implicit disconnect, then propagate.
            Ok(Err(e)) => {
                self.disconnect();
                Err(Error::Io(e))
            }
        }
    }
}

#[async_trait]
impl<R, W> Connection for StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_device(&self) -> &DeviceId {
        &self.remote
    }

    fn is_connected(&self) -> bool {
        !self.latch.is_closed()
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.latch.is_closed() {
            return Err(Error::Closed);
        }
        let mut reader = self.reader.lock().await;
        let result = tokio::time::timeout(self.io_timeout, reader.read(buf)).await;
        match self.settle(result)? {
            0 => {
                // Orderly end of stream: the connection never reconnects.
                self.disconnect();
                Err(Error::Closed)
            }
            n => Ok(n),
        }
    }

    async fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        if self.latch.is_closed() {
            return Err(Error::Closed);
        }
        let mut reader = self.reader.lock().await;
        let result = tokio::time::timeout(self.io_timeout, reader.read_exact(buf)).await;
        self.settle(result.map(|r| r.map(|_| ())))
    }

    async fn write_all(&self, buf: &[u8]) -> Result<()> {
        if self.latch.is_closed() {
            return Err(Error::Closed);
        }
        let mut writer = self.writer.lock().await;
        let result = tokio::time::timeout(self.io_timeout, async {
            writer.write_all(buf).await?;
            writer.flush().await
        })
        .await;
        self.settle(result)
    }

    fn disconnect(&self) {
        if self.latch.trip(self.notice()) {
            debug!(connection = %self.id, device = %self.remote, "disconnecting");
        }
    }

    fn on_disconnect(&self, listener: mpsc::UnboundedSender<DisconnectNotice>) {
        self.latch.subscribe(listener, self.notice());
    }
}

impl<R, W> fmt::Debug for StreamConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("connected", &!self.latch.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(timeout: Duration) -> (StreamConnection<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>, StreamConnection<tokio::io::ReadHalf<tokio::io::DuplexStream>, tokio::io::WriteHalf<tokio::io::DuplexStream>>) {
        let (a, b) = tokio::io::duplex(4096);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (
            StreamConnection::new(DeviceId::from("b"), ar, aw, timeout),
            StreamConnection::new(DeviceId::from("a"), br, bw, timeout),
        )
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (left, right) = pair(DEFAULT_IO_TIMEOUT);
        left.write_all(b"crown").await.unwrap();

        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"crown");
    }

    #[tokio::test(start_paused = true)]
    async fn read_timeout_leaves_connection_up() {
        let (left, _right) = pair(Duration::from_millis(50));

        let mut buf = [0u8; 1];
        let err = left.read_exact(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(left.is_connected());
    }

    #[tokio::test]
    async fn fatal_read_error_disconnects() {
        let (left, right) = pair(DEFAULT_IO_TIMEOUT);
        // Dropping the far end closes the stream: read_exact hits EOF,
        // which surfaces as a fatal I/O error, not a timeout.
        drop(right);

        let mut buf = [0u8; 1];
        let err = left.read_exact(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!left.is_connected());
    }

    #[tokio::test]
    async fn explicit_disconnect_is_idempotent() {
        let (left, _right) = pair(DEFAULT_IO_TIMEOUT);
        let (tx, mut rx) = mpsc::unbounded_channel();
        left.on_disconnect(tx);

        left.disconnect();
        left.disconnect();

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.connection, left.id());
        assert!(rx.try_recv().is_err());
        assert!(!left.is_connected());
    }

    #[tokio::test]
    async fn racing_fatal_error_and_explicit_disconnect_notify_once() {
        let (left, right) = pair(DEFAULT_IO_TIMEOUT);
        let left = std::sync::Arc::new(left);
        let (tx, mut rx) = mpsc::unbounded_channel();
        left.on_disconnect(tx);
        // Closing the far end makes the pending read fail fatally, which
        // triggers the implicit disconnect path while another task calls
        // disconnect() explicitly.
        drop(right);

        let explicit = {
            let conn = left.clone();
            tokio::spawn(async move { conn.disconnect() })
        };
        let mut buf = [0u8; 1];
        let io_result = left.read_exact(&mut buf).await;
        explicit.await.unwrap();

        assert!(io_result.is_err());
        assert!(!left.is_connected());
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.connection, left.id());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn io_after_disconnect_reports_closed() {
        let (left, _right) = pair(DEFAULT_IO_TIMEOUT);
        left.disconnect();

        assert!(matches!(left.write_all(b"x").await, Err(Error::Closed)));
        let mut buf = [0u8; 1];
        assert!(matches!(left.read_exact(&mut buf).await, Err(Error::Closed)));
    }
}
