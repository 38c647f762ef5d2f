//! Tracks the live connections of one device.
//!
//! The manager owns inbound connections until the state machine adopts
//! them, layers the bounded-retry policy over the transport's dialer and
//! keeps the registry that the state machine validates incoming events
//! against. A successful connect is visible in [`ConnectionManager::all_connections`]
//! before the call returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use coronet_protocol::DeviceId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::admin::{reader_loop, TransportEvent};
use crate::connection::{Connection, ConnectionId, DisconnectNotice};
use crate::connector::Connector;

/// Delay between consecutive connect attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

struct Inner {
    connector: Arc<dyn Connector>,
    connections: Mutex<HashMap<ConnectionId, Arc<dyn Connection>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    disconnects: mpsc::UnboundedSender<DisconnectNotice>,
}

/// Handle to one device's connection registry. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
    retry_backoff: Duration,
}

impl ConnectionManager {
    /// Create a manager dialing through `connector` and surfacing
    /// transport events on `events`.
    pub fn new(
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            connector,
            connections: Mutex::new(HashMap::new()),
            events,
            disconnects: disconnect_tx,
        });
        tokio::spawn(deregistration_pump(Arc::downgrade(&inner), disconnect_rx));
        Self {
            inner,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    /// Override the delay between connect attempts.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Connect to a device with up to `max_attempts` attempts.
    ///
    /// Connection failure here is an expected, retried condition, not a
    /// defect: after all attempts fail the result is simply `None` and the
    /// caller decides what the failure means for its role.
    pub async fn connect_to_device(
        &self,
        device: &DeviceId,
        max_attempts: u32,
    ) -> Option<Arc<dyn Connection>> {
        for attempt in 1..=max_attempts {
            match self.inner.connector.dial(device).await {
                Ok(conn) => {
                    info!(%device, connection = %conn.id(), attempt, "connected to device");
                    self.register(conn.clone());
                    return Some(conn);
                }
                Err(e) => {
                    debug!(%device, attempt, max_attempts, error = %e, "connect attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }
        warn!(%device, max_attempts, "all connect attempts failed");
        None
    }

    /// Register a connection (dialed or inbound) with the registry.
    ///
    /// Spawns the connection's reader loop, wires up automatic
    /// deregistration and announces the connection on the event stream.
    pub fn register(&self, conn: Arc<dyn Connection>) {
        {
            let mut connections = self.inner.connections.lock().expect("registry poisoned");
            connections.insert(conn.id(), conn.clone());
        }
        conn.on_disconnect(self.inner.disconnects.clone());
        tokio::spawn(reader_loop(conn.clone(), self.inner.events.clone()));
        let _ = self
            .inner
            .events
            .send(TransportEvent::ConnectionEstablished(conn));
    }

    /// Snapshot of every currently-tracked connection.
    pub fn all_connections(&self) -> Vec<Arc<dyn Connection>> {
        let connections = self.inner.connections.lock().expect("registry poisoned");
        connections.values().cloned().collect()
    }

    /// Whether the registry currently tracks this connection.
    pub fn is_tracked(&self, id: ConnectionId) -> bool {
        let connections = self.inner.connections.lock().expect("registry poisoned");
        connections.contains_key(&id)
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        let connections = self.inner.connections.lock().expect("registry poisoned");
        connections.len()
    }

    /// Disconnect every tracked connection.
    pub fn disconnect_all(&self) {
        for conn in self.all_connections() {
            conn.disconnect();
        }
    }
}

/// Removes closed connections from the registry and forwards the closed
/// event. Runs until the manager is dropped.
async fn deregistration_pump(
    inner: Weak<Inner>,
    mut disconnects: mpsc::UnboundedReceiver<DisconnectNotice>,
) {
    while let Some(notice) = disconnects.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        {
            let mut connections = inner.connections.lock().expect("registry poisoned");
            connections.remove(&notice.connection);
        }
        debug!(connection = %notice.connection, device = %notice.device, "deregistered connection");
        let _ = inner.events.send(TransportEvent::ConnectionClosed(notice));
    }
}
