//! Boundaries to the discovery and accept subsystems.
//!
//! The beacon and the connection acceptor are external collaborators: the
//! state machine only toggles them when roles change and consumes the
//! discovery events they emit. No protocol logic lives behind these
//! traits.

/// Discovery beacon control surface.
///
/// A running beacon advertises this device's presence and current role so
/// peers can observe it passively; active discovery additionally scans
/// for other devices and feeds [`crate::event::DiscoveryEvent`]s into the
/// state machine.
pub trait Beacon: Send + Sync {
    /// Start advertising.
    fn start(&self);

    /// Stop advertising and scanning.
    fn stop(&self);

    /// Enable or disable active scanning. Subordinate roles disable it so
    /// others can still see their state without them probing the network.
    fn set_active_discovery(&self, active: bool);
}

/// Inbound-connection acceptor control surface.
pub trait Acceptor: Send + Sync {
    /// Begin accepting inbound connections (King and Free roles).
    fn start_accepting(&self);

    /// Refuse new inbound connections (subordinate roles).
    fn stop_accepting(&self);
}

/// Beacon that does nothing, for kingdoms wired without discovery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBeacon;

impl Beacon for NullBeacon {
    fn start(&self) {}
    fn stop(&self) {}
    fn set_active_discovery(&self, _active: bool) {}
}

/// Acceptor that does nothing, for transports managed externally.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAcceptor;

impl Acceptor for NullAcceptor {
    fn start_accepting(&self) {}
    fn stop_accepting(&self) {}
}
