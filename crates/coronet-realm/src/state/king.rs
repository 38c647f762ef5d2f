//! The King state: the coordinating root of a kingdom.
//!
//! The King owns one connection per subordinate, keeps the authoritative
//! census and designates exactly one Peasant as Prince. When two kingdoms
//! discover each other, device-id ordering decides the merge: the King
//! with the lexicographically smaller id keeps the crown, the other
//! orders its kingdom to bow down and joins as a Peasant itself.

use std::collections::HashMap;
use std::sync::Arc;

use coronet_protocol::{AdminMessage, Census, DeviceId, Role};
use coronet_transport::{Connection, ConnectionId, DisconnectNotice};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::{DiscoveryEvent, Event, TimeoutEvent};
use crate::session::Session;
use crate::state::{Disconnects, FreeState, State, Transition};

/// The root of a kingdom.
pub struct KingState {
    /// Subordinate connections by connection identity.
    subjects: HashMap<ConnectionId, DeviceId>,
    /// The currently designated heir.
    prince: Option<DeviceId>,
    /// Whether the heir has acknowledged its pronouncement.
    prince_confirmed: bool,
}

impl KingState {
    /// Crown a King with no subjects yet.
    pub fn new() -> Self {
        Self {
            subjects: HashMap::new(),
            prince: None,
            prince_confirmed: false,
        }
    }

    /// Number of subordinates currently connected.
    pub fn peasant_count(&self) -> usize {
        self.subjects.len()
    }

    /// The currently designated heir, if any.
    pub fn prince(&self) -> Option<&DeviceId> {
        self.prince.as_ref()
    }

    /// Build the authoritative census: the King, its Prince and every
    /// other subject as Peasant.
    pub fn census(&self, session: &Session) -> Census {
        let mut census = Census::new();
        census.insert(session.local_device().clone(), Role::King);
        for device in self.subjects.values() {
            let role = if Some(device) == self.prince.as_ref() {
                Role::Prince
            } else {
                Role::Peasant
            };
            census.insert(device.clone(), role);
        }
        census
    }

    /// Re-evaluate the heir designation. The Prince is the subject with
    /// the smallest device id; deterministic, so a re-crowned King makes
    /// the same choice its predecessor would.
    fn select_prince(&mut self) -> Option<AdminMessage> {
        let candidate = self.subjects.values().min().cloned();
        if candidate == self.prince {
            return None;
        }
        self.prince = candidate.clone();
        self.prince_confirmed = false;
        candidate.map(|heir| {
            info!(prince = %heir, "pronouncing a new prince");
            AdminMessage::PronouncePrince(heir)
        })
    }

    pub(crate) async fn on_event(self, session: &mut Session, event: Event) -> Result<Transition> {
        match event {
            Event::ConnectionEstablished(conn) => Ok(self.on_connection_established(session, conn)),
            Event::ConnectionClosed(notice) => Ok(self.on_connection_closed(session, notice)),
            Event::Admin(message) => Ok(self.on_admin_message(message)),
            Event::DeviceDiscovered(discovery) => Ok(self.on_discovery(session, discovery)),
            Event::Timeout(TimeoutEvent::CensusTick) => Ok(self.on_census_tick(session)),
            Event::Timeout(TimeoutEvent::DiscoveryTimeout) => Ok(Transition::stay(self.into())),
        }
    }

    /// A subordinate joined: track it, update the succession and publish
    /// a fresh census.
    fn on_connection_established(
        mut self,
        session: &Session,
        conn: Arc<dyn Connection>,
    ) -> Transition {
        let device = conn.remote_device().clone();
        debug!(%device, connection = %conn.id(), "subject joined the kingdom");
        self.subjects.insert(conn.id(), device);

        let pronouncement = self.select_prince();
        let census = AdminMessage::Census(self.census(session));
        let mut transition = Transition::stay(self.into()).with_message(census);
        if let Some(msg) = pronouncement {
            transition = transition.with_message(msg);
        }
        transition
    }

    /// A subordinate left: untrack it and re-evaluate the succession. A
    /// King with no subjects left simply rules an empty kingdom until
    /// discovery brings new members.
    fn on_connection_closed(mut self, session: &Session, notice: DisconnectNotice) -> Transition {
        let Some(device) = self.subjects.remove(&notice.connection) else {
            // Stale event for a connection a previous role held.
            return Transition::stay(self.into());
        };
        debug!(%device, "subject left the kingdom");

        if self.prince.as_ref() == Some(&device) {
            self.prince = None;
            self.prince_confirmed = false;
        }
        let pronouncement = self.select_prince();
        let census = AdminMessage::Census(self.census(session));
        let mut transition = Transition::stay(self.into()).with_message(census);
        if let Some(msg) = pronouncement {
            transition = transition.with_message(msg);
        }
        transition
    }

    fn on_admin_message(mut self, message: AdminMessage) -> Transition {
        match message {
            AdminMessage::AckPronouncePrince(device) => {
                if self.prince.as_ref() == Some(&device) {
                    debug!(prince = %device, "prince confirmed its pronouncement");
                    self.prince_confirmed = true;
                } else {
                    warn!(%device, "ack from a device that is not the designated prince");
                }
                Transition::stay(self.into())
            }
            // Censuses originate here; pronouncements and bow-downs from
            // subjects carry no meaning for a sitting King.
            AdminMessage::Census(_)
            | AdminMessage::PronouncePrince(_)
            | AdminMessage::BowDownToNewKing(_) => Transition::stay(self.into()),
        }
    }

    /// Two kingdoms found each other. The smaller device id keeps the
    /// crown; if that is the other King, order the whole kingdom to bow
    /// down before our connections disappear, then join the winner as a
    /// Peasant ourselves.
    fn on_discovery(self, session: &Session, discovery: DiscoveryEvent) -> Transition {
        if discovery.role != Role::King || session.is_one_of_ours(&discovery.device) {
            return Transition::stay(self.into());
        }

        if session.local_device() < &discovery.device {
            debug!(rival = %discovery.device, "rival king has the greater id, keeping the crown");
            return Transition::stay(self.into());
        }

        info!(new_king = %discovery.device, "bowing the kingdom down to the rival king");
        Transition::to(State::Free(FreeState::new()))
            .with_message(AdminMessage::BowDownToNewKing(discovery.device.clone()))
            .disconnecting(Disconnects::All)
            .then_join(discovery.device)
    }

    /// Periodic census broadcast; also re-pronounces an unconfirmed heir
    /// so a lost pronouncement is retried.
    fn on_census_tick(self, session: &Session) -> Transition {
        let census = AdminMessage::Census(self.census(session));
        let repronounce = match (&self.prince, self.prince_confirmed) {
            (Some(prince), false) => Some(AdminMessage::PronouncePrince(prince.clone())),
            _ => None,
        };
        let mut transition = Transition::stay(self.into()).with_message(census);
        if let Some(msg) = repronounce {
            transition = transition.with_message(msg);
        }
        transition
    }
}

impl Default for KingState {
    fn default() -> Self {
        Self::new()
    }
}

impl From<KingState> for State {
    fn from(state: KingState) -> Self {
        State::King(state)
    }
}
