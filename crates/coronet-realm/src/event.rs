//! Events consumed by the connection state machine.

use std::sync::Arc;

use coronet_protocol::{AdminMessage, DeviceId, Role};
use coronet_transport::{Connection, DisconnectNotice, TransportEvent};

/// One entry on a device's strictly-ordered event queue.
#[derive(Debug)]
pub enum Event {
    /// A connection was established and registered with the manager.
    ConnectionEstablished(Arc<dyn Connection>),
    /// A tracked connection closed. Delivery is queued, so the event may
    /// describe a connection a previous role held.
    ConnectionClosed(DisconnectNotice),
    /// A decoded admin message arrived.
    Admin(AdminMessage),
    /// The beacon observed a peer device.
    DeviceDiscovered(DiscoveryEvent),
    /// A state machine timer fired.
    Timeout(TimeoutEvent),
}

impl From<TransportEvent> for Event {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::ConnectionEstablished(conn) => Self::ConnectionEstablished(conn),
            TransportEvent::ConnectionClosed(notice) => Self::ConnectionClosed(notice),
            TransportEvent::Admin { message, .. } => Self::Admin(message),
        }
    }
}

/// A device observed by the beacon, with the role it advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    /// The discovered device.
    pub device: DeviceId,
    /// The role it advertised at observation time.
    pub role: Role,
}

/// Timer events driving election and census cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutEvent {
    /// A Free device's discovery window elapsed without finding a kingdom.
    DiscoveryTimeout,
    /// The King's periodic census broadcast is due.
    CensusTick,
}
