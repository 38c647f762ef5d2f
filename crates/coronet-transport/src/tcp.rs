//! TCP transport: connections and a route-table connector.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coronet_protocol::DeviceId;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::Connection;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::stream::{StreamConnection, DEFAULT_IO_TIMEOUT};

/// A [`Connection`] over a TCP stream.
pub type TcpConnection = StreamConnection<OwnedReadHalf, OwnedWriteHalf>;

/// Wrap an already-connected TCP stream (acceptor side).
pub fn from_stream(remote: DeviceId, stream: TcpStream, io_timeout: Duration) -> TcpConnection {
    let (reader, writer) = stream.into_split();
    StreamConnection::new(remote, reader, writer, io_timeout)
}

/// Dial a device at a known socket address.
pub async fn connect(
    remote: DeviceId,
    addr: SocketAddr,
    io_timeout: Duration,
) -> Result<TcpConnection> {
    let stream = tokio::time::timeout(io_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout)??;
    stream.set_nodelay(true)?;
    debug!(device = %remote, %addr, "tcp connection established");
    Ok(from_stream(remote, stream, io_timeout))
}

/// [`Connector`] that resolves device ids through a route table.
///
/// Address resolution (how a device id maps to a socket address) is fed by
/// the discovery layer; the connector only keeps the current mapping.
pub struct TcpConnector {
    routes: RwLock<HashMap<DeviceId, SocketAddr>>,
    io_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector with an empty route table.
    pub fn new() -> Self {
        Self::with_io_timeout(DEFAULT_IO_TIMEOUT)
    }

    /// Create a connector with a custom per-operation I/O timeout.
    pub fn with_io_timeout(io_timeout: Duration) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            io_timeout,
        }
    }

    /// Record or update the address of a device.
    pub async fn add_route(&self, device: DeviceId, addr: SocketAddr) {
        self.routes.write().await.insert(device, addr);
    }

    /// Forget the address of a device.
    pub async fn remove_route(&self, device: &DeviceId) {
        self.routes.write().await.remove(device);
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn dial(&self, device: &DeviceId) -> Result<Arc<dyn Connection>> {
        let addr = {
            let routes = self.routes.read().await;
            routes
                .get(device)
                .copied()
                .ok_or_else(|| Error::NoRoute(device.clone()))?
        };
        let conn = connect(device.clone(), addr, self.io_timeout).await?;
        Ok(Arc::new(conn))
    }
}
