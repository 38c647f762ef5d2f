//! Mutable context shared across state transitions.

use std::sync::Arc;

use coronet_protocol::{Census, DeviceId};
use coronet_transport::{AdminBroadcastChannel, ConnectionManager};
use tokio::sync::Notify;
use tracing::debug;

use crate::beacon::{Acceptor, Beacon};
use crate::config::RealmConfig;

/// Per-device mutable context handed into every state transition.
///
/// Created once when the state machine starts and lives for the process's
/// networking lifetime. Only the dispatcher task touches it, so nothing
/// here is locked.
pub struct Session {
    local_device: DeviceId,
    config: RealmConfig,
    manager: ConnectionManager,
    broadcast: AdminBroadcastChannel,
    beacon: Arc<dyn Beacon>,
    acceptor: Arc<dyn Acceptor>,
    last_census: Option<Census>,
    preparation_cancel: Arc<Notify>,
}

impl Session {
    /// Assemble a session for one device.
    pub fn new(
        local_device: DeviceId,
        config: RealmConfig,
        manager: ConnectionManager,
        broadcast: AdminBroadcastChannel,
        beacon: Arc<dyn Beacon>,
        acceptor: Arc<dyn Acceptor>,
    ) -> Self {
        Self {
            local_device,
            config,
            manager,
            broadcast,
            beacon,
            acceptor,
            last_census: None,
            preparation_cancel: Arc::new(Notify::new()),
        }
    }

    /// This device's id.
    pub fn local_device(&self) -> &DeviceId {
        &self.local_device
    }

    /// Ownership test: is the given id one of ours?
    pub fn is_one_of_ours(&self, device: &DeviceId) -> bool {
        device == &self.local_device
    }

    /// State machine configuration.
    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// The device's connection manager.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// The admin broadcast channel.
    pub fn broadcast(&self) -> &AdminBroadcastChannel {
        &self.broadcast
    }

    /// The discovery beacon boundary.
    pub fn beacon(&self) -> &dyn Beacon {
        self.beacon.as_ref()
    }

    /// The inbound-connection acceptor boundary.
    pub fn acceptor(&self) -> &dyn Acceptor {
        self.acceptor.as_ref()
    }

    /// Shared handle to the beacon, for out-of-band teardown.
    pub fn beacon_handle(&self) -> Arc<dyn Beacon> {
        self.beacon.clone()
    }

    /// Shared handle to the acceptor, for out-of-band teardown.
    pub fn acceptor_handle(&self) -> Arc<dyn Acceptor> {
        self.acceptor.clone()
    }

    /// The latest census received, if any.
    pub fn last_census(&self) -> Option<&Census> {
        self.last_census.as_ref()
    }

    /// Record a newly received census, replacing the previous one.
    pub fn record_census(&mut self, census: Census) {
        self.last_census = Some(census);
    }

    /// Token used to cancel an in-progress crowning preparation wait.
    pub fn preparation_cancel(&self) -> Arc<Notify> {
        self.preparation_cancel.clone()
    }

    /// Wait out the crowning preparation grace period.
    ///
    /// Returns `true` when the full period elapsed and `false` when the
    /// wait was cancelled; cancellation is a cooperative abort and the
    /// caller must leave the state machine unchanged.
    pub async fn crowning_preparation_wait(&self) -> bool {
        let cancel = self.preparation_cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.crowning_preparation_timeout) => true,
            _ = cancel.notified() => {
                debug!("crowning preparation wait cancelled");
                false
            }
        }
    }
}
