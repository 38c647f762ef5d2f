//! The Free state: no kingdom membership.

use coronet_protocol::{ConnectionAccomplishmentType, Role};
use tracing::{debug, info};

use crate::error::Result;
use crate::event::{DiscoveryEvent, Event, TimeoutEvent};
use crate::session::Session;
use crate::state::{KingState, PeasantState, State, Transition};

/// A device looking for a kingdom.
///
/// Free devices scan actively. Discovering a King leads to a voluntary
/// join; if the discovery window closes with nothing found, the device
/// crowns itself King of a brand-new single-device kingdom.
#[derive(Debug, Default)]
pub struct FreeState;

impl FreeState {
    /// Create the free state.
    pub fn new() -> Self {
        Self
    }

    pub(crate) async fn on_event(self, session: &mut Session, event: Event) -> Result<Transition> {
        match event {
            Event::DeviceDiscovered(discovery) => self.on_discovery(session, discovery).await,
            Event::Timeout(TimeoutEvent::DiscoveryTimeout) => {
                info!("discovery window elapsed with no kingdom found, crowning self");
                Ok(Transition::to(State::King(KingState::new())))
            }
            // Stale events from a previous role; a Free device holds no
            // persistent connections of its own.
            Event::ConnectionEstablished(_)
            | Event::ConnectionClosed(_)
            | Event::Admin(_)
            | Event::Timeout(TimeoutEvent::CensusTick) => Ok(Transition::stay(self.into())),
        }
    }

    async fn on_discovery(
        self,
        session: &mut Session,
        discovery: DiscoveryEvent,
    ) -> Result<Transition> {
        if discovery.role != Role::King || session.is_one_of_ours(&discovery.device) {
            return Ok(Transition::stay(self.into()));
        }

        debug!(king = %discovery.device, "discovered a kingdom, joining voluntarily");
        let retries = session.config().max_connect_retries;
        match session
            .manager()
            .connect_to_device(&discovery.device, retries)
            .await
        {
            Some(conn) => Ok(Transition::to(State::Peasant(PeasantState::new(
                conn,
                ConnectionAccomplishmentType::Voluntarily,
            )))),
            None => {
                debug!(king = %discovery.device, "could not reach the discovered king");
                Ok(Transition::stay(self.into()))
            }
        }
    }
}

impl From<FreeState> for State {
    fn from(state: FreeState) -> Self {
        State::Free(state)
    }
}
