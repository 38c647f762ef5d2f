//! In-process transport fabric for tests and simulation.
//!
//! `MemoryNet` plays the role of the physical network: devices register a
//! listener to accept inbound connections, and a [`MemoryConnector`] dials
//! through the fabric. Connections are paired duplex pipes, so the full
//! connection failure policy applies exactly as it does over TCP.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coronet_protocol::DeviceId;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::connection::Connection;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::stream::{StreamConnection, DEFAULT_IO_TIMEOUT};

/// A [`Connection`] over an in-process duplex pipe.
pub type MemoryConnection = StreamConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Create a directly-wired connection pair: `(a's view of b, b's view of a)`.
pub fn pair(a: DeviceId, b: DeviceId) -> (Arc<MemoryConnection>, Arc<MemoryConnection>) {
    pair_with_timeout(a, b, DEFAULT_IO_TIMEOUT)
}

/// [`pair`] with a custom per-operation I/O timeout.
pub fn pair_with_timeout(
    a: DeviceId,
    b: DeviceId,
    io_timeout: Duration,
) -> (Arc<MemoryConnection>, Arc<MemoryConnection>) {
    let (left, right) = tokio::io::duplex(PIPE_CAPACITY);
    let (lr, lw) = tokio::io::split(left);
    let (rr, rw) = tokio::io::split(right);
    (
        Arc::new(StreamConnection::new(b, lr, lw, io_timeout)),
        Arc::new(StreamConnection::new(a, rr, rw, io_timeout)),
    )
}

struct Fabric {
    /// Inbound listeners by device id.
    listeners: HashMap<DeviceId, mpsc::UnboundedSender<Arc<dyn Connection>>>,
    /// Devices that refuse every dial (simulated dead/partitioned device).
    unreachable: HashSet<DeviceId>,
}

/// Shared in-process network fabric.
pub struct MemoryNet {
    fabric: Mutex<Fabric>,
    io_timeout: Duration,
}

impl MemoryNet {
    /// Create an empty fabric.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fabric: Mutex::new(Fabric {
                listeners: HashMap::new(),
                unreachable: HashSet::new(),
            }),
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    /// Register `device` as accepting inbound connections.
    ///
    /// Returns the stream of accepted connections; dropping it makes the
    /// device unreachable again.
    pub async fn listen(&self, device: DeviceId) -> mpsc::UnboundedReceiver<Arc<dyn Connection>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.fabric.lock().await.listeners.insert(device, tx);
        rx
    }

    /// Stop accepting inbound connections for `device`.
    pub async fn stop_listening(&self, device: &DeviceId) {
        self.fabric.lock().await.listeners.remove(device);
    }

    /// Make every dial to `device` fail until [`Self::set_reachable`].
    pub async fn set_unreachable(&self, device: DeviceId) {
        self.fabric.lock().await.unreachable.insert(device);
    }

    /// Allow dials to `device` again.
    pub async fn set_reachable(&self, device: &DeviceId) {
        self.fabric.lock().await.unreachable.remove(device);
    }

    async fn dial_from(&self, from: &DeviceId, to: &DeviceId) -> Result<Arc<dyn Connection>> {
        let mut fabric = self.fabric.lock().await;
        if fabric.unreachable.contains(to) {
            return Err(Error::NoRoute(to.clone()));
        }
        let Some(listener) = fabric.listeners.get(to) else {
            return Err(Error::NoRoute(to.clone()));
        };

        let (near, far) = pair_with_timeout(from.clone(), to.clone(), self.io_timeout);
        if listener.send(far).is_err() {
            // Listener dropped without deregistering.
            fabric.listeners.remove(to);
            return Err(Error::NoRoute(to.clone()));
        }
        debug!(%from, %to, "memory fabric connection established");
        Ok(near)
    }
}

/// [`Connector`] dialing through a [`MemoryNet`].
pub struct MemoryConnector {
    net: Arc<MemoryNet>,
    local: DeviceId,
}

impl MemoryConnector {
    /// Create a connector dialing on behalf of `local`.
    pub fn new(net: Arc<MemoryNet>, local: DeviceId) -> Self {
        Self { net, local }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn dial(&self, device: &DeviceId) -> Result<Arc<dyn Connection>> {
        self.net.dial_from(&self.local, device).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dial_reaches_listener() {
        let net = MemoryNet::new();
        let mut inbound = net.listen(DeviceId::from("server")).await;

        let connector = MemoryConnector::new(net.clone(), DeviceId::from("client"));
        let near = connector.dial(&DeviceId::from("server")).await.unwrap();
        let far = inbound.recv().await.unwrap();

        assert_eq!(near.remote_device(), &DeviceId::from("server"));
        assert_eq!(far.remote_device(), &DeviceId::from("client"));

        near.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn dial_without_listener_fails() {
        let net = MemoryNet::new();
        let connector = MemoryConnector::new(net, DeviceId::from("client"));
        let err = connector.dial(&DeviceId::from("nobody")).await.unwrap_err();
        assert!(matches!(err, Error::NoRoute(_)));
    }

    #[tokio::test]
    async fn unreachable_device_refuses_dials() {
        let net = MemoryNet::new();
        let _inbound = net.listen(DeviceId::from("server")).await;
        net.set_unreachable(DeviceId::from("server")).await;

        let connector = MemoryConnector::new(net.clone(), DeviceId::from("client"));
        assert!(connector.dial(&DeviceId::from("server")).await.is_err());

        net.set_reachable(&DeviceId::from("server")).await;
        assert!(connector.dial(&DeviceId::from("server")).await.is_ok());
    }

    #[tokio::test]
    async fn disconnected_end_refuses_io() {
        let (near, far) = pair_with_timeout(
            DeviceId::from("a"),
            DeviceId::from("b"),
            Duration::from_millis(20),
        );
        near.disconnect();

        assert!(matches!(near.write_all(b"x").await, Err(Error::Closed)));

        // The far end still holds its pipe; with nothing queued its read
        // times out rather than failing fatally.
        let mut buf = [0u8; 1];
        let err = far.read_exact(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert!(far.is_connected());
    }
}
