//! The Peasant state: a subordinate bound to its King.

use std::sync::Arc;

use coronet_protocol::{AdminMessage, ConnectionAccomplishmentType, DeviceId, Role};
use coronet_transport::{Connection, DisconnectNotice};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::session::Session;
use crate::state::{Disconnects, FreeState, PrinceState, State, Transition};

/// Subordinate device holding exactly one connection: the King's.
pub struct PeasantState {
    king_connection: Arc<dyn Connection>,
    accomplishment: ConnectionAccomplishmentType,
}

impl PeasantState {
    /// Bind a Peasant to its King connection.
    pub fn new(
        king_connection: Arc<dyn Connection>,
        accomplishment: ConnectionAccomplishmentType,
    ) -> Self {
        Self {
            king_connection,
            accomplishment,
        }
    }

    /// How this Peasant came to its current King.
    pub fn accomplishment(&self) -> ConnectionAccomplishmentType {
        self.accomplishment
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
            // Subordinates neither scan nor run election timers.
            Event::DeviceDiscovered(_) | Event::Timeout(_) => Ok(Transition::stay(self.into())),
        }
    }

    /// The only connection a Peasant expects is its King's. A tracked
    /// stranger is a stale event from a previous role (for example we
    /// just stepped down from King and its peasant connections are still
    /// draining from the queue); an untracked stranger means the session
    /// is inconsistent.
    fn on_connection_established(
        self,
        session: &Session,
        conn: Arc<dyn Connection>,
    ) -> Result<Transition> {
        if conn.id() != self.king_connection.id() && !session.manager().is_tracked(conn.id()) {
            return Err(Error::ProtocolViolation {
                role: Role::Peasant,
                connection: conn.id(),
                device: conn.remote_device().clone(),
            });
        }
        Ok(Transition::stay(self.into()))
    }

    /// Losing the King connection is the failover path: look for the
    /// Prince in the last census, give it time to prepare its crowning,
    /// then follow it. Everything else is a stale closed event.
    async fn on_connection_closed(
        self,
        session: &mut Session,
        notice: DisconnectNotice,
    ) -> Result<Transition> {
        if notice.connection != self.king_connection.id() {
            return Ok(Transition::stay(self.into()));
        }

        debug!(king = %self.king_device(), "lost the king connection, looking for the prince");

        let Some(census) = session.last_census().cloned() else {
            warn!("king lost but no census was ever received, becoming free");
            return Ok(Transition::to(State::Free(FreeState::new())));
        };
        let Some(prince) = census.prince().cloned() else {
            debug!("last census names no prince, becoming free");
            return Ok(Transition::to(State::Free(FreeState::new())));
        };

        debug!(%prince, "waiting out the crowning preparation period");
        if !session.crowning_preparation_wait().await {
            // Cooperative abort: the wait was cancelled, nothing changed.
            return Ok(Transition::stay(self.into()));
        }

        let retries = session.config().max_connect_retries;
        match session.manager().connect_to_device(&prince, retries).await {
            Some(conn) => {
                debug!(%prince, "followed the heir to the throne");
                Ok(Transition::to(State::Peasant(PeasantState::new(
                    conn,
                    ConnectionAccomplishmentType::FollowedHeir,
                ))))
            }
            None => {
                warn!(%prince, "could not reach the prince, becoming free");
                Ok(Transition::to(State::Free(FreeState::new())))
            }
        }
    }

    fn on_admin_message(self, session: &Session, message: AdminMessage) -> Result<Transition> {
        match message {
            AdminMessage::PronouncePrince(prince) => {
                if session.is_one_of_ours(&prince) {
                    debug!("pronounced prince, sending ack and changing state");
                    let ack = AdminMessage::AckPronouncePrince(prince);
                    Ok(Transition::to(State::Prince(PrinceState::new(
                        self.king_connection,
                    )))
                    .with_message(ack))
                } else {
                    debug!(%prince, "pronouncement names another device, remaining peasant");
                    Ok(Transition::stay(self.into()))
                }
            }
            AdminMessage::BowDownToNewKing(new_king) => {
                debug!(%new_king, "bowing down to a new king");
                // Old King connection goes first; only then chase the new
                // King. The dispatcher preserves that order.
                Ok(Transition::to(State::Free(FreeState::new()))
                    .disconnecting(Disconnects::These(vec![self.king_connection]))
                    .then_join(new_king))
            }
            // The session already recorded any census; acks are for kings.
            AdminMessage::Census(_) | AdminMessage::AckPronouncePrince(_) => {
                Ok(Transition::stay(self.into()))
            }
        }
    }
}

impl From<PeasantState> for State {
    fn from(state: PeasantState) -> Self {
        State::Peasant(state)
    }
}
