//! The Prince state: the designated heir.
//!
//! A Prince behaves like a Peasant with one difference: losing the King
//! connection means self-promotion rather than a search for a further
//! heir. It can also be degraded back to Peasant when the King pronounces
//! somebody else.

use std::sync::Arc;

use coronet_protocol::{AdminMessage, ConnectionAccomplishmentType, DeviceId, Role};
use coronet_transport::{Connection, DisconnectNotice};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::session::Session;
use crate::state::{Disconnects, FreeState, KingState, PeasantState, State, Transition};

/// The designated heir, bound to its King like any other subordinate.
pub struct PrinceState {
    king_connection: Arc<dyn Connection>,
}

impl PrinceState {
    /// Bind the heir to the King connection it keeps from Peasant state.
    pub fn new(king_connection: Arc<dyn Connection>) -> Self {
        Self { king_connection }
    }

    /// The King's device id.
    pub fn king_device(&self) -> &DeviceId {
        self.king_connection.remote_device()
    }

    /// The connection to the King.
    pub fn king_connection(&self) -> &Arc<dyn Connection> {
        &self.king_connection
    }

    pub(crate) async fn on_event(self, session: &mut Session, event: Event) -> Result<Transition> {
        match event {
            Event::ConnectionEstablished(conn) => self.on_connection_established(session, conn),
            Event::ConnectionClosed(notice) => self.on_connection_closed(session, notice).await,
            Event::Admin(message) => self.on_admin_message(session, message),
            Event::DeviceDiscovered(_) | Event::Timeout(_) => Ok(Transition::stay(self.into())),
        }
    }

    fn on_connection_established(
        self,
        session: &Session,
        conn: Arc<dyn Connection>,
    ) -> Result<Transition> {
        if conn.id() != self.king_connection.id() && !session.manager().is_tracked(conn.id()) {
            return Err(Error::ProtocolViolation {
                role: Role::Prince,
                connection: conn.id(),
                device: conn.remote_device().clone(),
            });
        }
        Ok(Transition::stay(self.into()))
    }

    /// The King is gone: this is the succession. Wait out the same
    /// crowning preparation period the peasants grant us, then take the
    /// throne and let them reconnect.
    async fn on_connection_closed(
        self,
        session: &mut Session,
        notice: DisconnectNotice,
    ) -> Result<Transition> {
        if notice.connection != self.king_connection.id() {
            return Ok(Transition::stay(self.into()));
        }

        info!(king = %self.king_device(), "king lost, preparing the crowning");
        if !session.crowning_preparation_wait().await {
            return Ok(Transition::stay(self.into()));
        }

        Ok(Transition::to(State::King(KingState::new())))
    }

    fn on_admin_message(self, session: &Session, message: AdminMessage) -> Result<Transition> {
        match message {
            AdminMessage::PronouncePrince(prince) => {
                if session.is_one_of_ours(&prince) {
                    // Re-pronouncement of ourselves: confirm again.
                    let ack = AdminMessage::AckPronouncePrince(prince);
                    Ok(Transition::stay(self.into()).with_message(ack))
                } else {
                    debug!(new_prince = %prince, "degraded from prince to peasant");
                    Ok(Transition::to(State::Peasant(PeasantState::new(
                        self.king_connection,
                        ConnectionAccomplishmentType::Degraded,
                    ))))
                }
            }
            AdminMessage::BowDownToNewKing(new_king) => {
                debug!(%new_king, "bowing down to a new king");
                Ok(Transition::to(State::Free(FreeState::new()))
                    .disconnecting(Disconnects::These(vec![self.king_connection]))
                    .then_join(new_king))
            }
            AdminMessage::Census(_) | AdminMessage::AckPronouncePrince(_) => {
                Ok(Transition::stay(self.into()))
            }
        }
    }
}

impl From<PrinceState> for State {
    fn from(state: PrinceState) -> Self {
        State::Prince(state)
    }
}
