//! The four device states and their shared event contract.
//!
//! Every state implements the same handler set; handlers consume the
//! current state and return a [`Transition`] carrying the next state plus
//! the transition's explicit outputs: admin messages to broadcast,
//! connections to tear down and an optional join-new-king follow-up. The
//! dispatcher applies those outputs in a fixed order (messages, then
//! disconnects, then the follow-up dial), which is what lets a losing
//! King order its kingdom to bow down before its connections vanish.

mod free;
mod king;
mod peasant;
mod prince;


use std::fmt;
use std::sync::Arc;

pub use free::FreeState;
pub use king::KingState;
pub use peasant::PeasantState;
pub use prince::PrinceState;

use coronet_protocol::{AdminMessage, DeviceId, Role};
use coronet_transport::Connection;

use crate::error::Result;
use crate::event::Event;
use crate::session::Session;

/// Connections a transition tears down, applied after its messages are
/// broadcast.
#[derive(Debug, Default)]
pub enum Disconnects {
    /// Keep everything.
    #[default]
    None,
    /// Tear down these connections.
    These(Vec<Arc<dyn Connection>>),
    /// Tear down every tracked connection.
    All,
}

/// Deferred tail of a transition, run after messages and disconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Dial the named device with bounded retries; success makes this
    /// device a Peasant of the new King, failure leaves it Free.
    JoinNewKing(DeviceId),
}

/// Result of handling one event.
pub struct Transition {
    next: State,
    entered: bool,
    messages: Vec<AdminMessage>,
    disconnects: Disconnects,
    follow_up: Option<FollowUp>,
}

impl Transition {
    /// No transition: remain in the given state, entry action not re-run.
    pub fn stay(state: State) -> Self {
        Self {
            next: state,
            entered: false,
            messages: Vec::new(),
            disconnects: Disconnects::None,
            follow_up: None,
        }
    }

    /// Transition into a new state; its entry action will run.
    pub fn to(state: State) -> Self {
        Self {
            entered: true,
            ..Self::stay(state)
        }
    }

    /// Queue an admin message for broadcast.
    #[must_use]
    pub fn with_message(mut self, message: AdminMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Queue connections for teardown after the messages go out.
    #[must_use]
    pub fn disconnecting(mut self, disconnects: Disconnects) -> Self {
        self.disconnects = disconnects;
        self
    }

    /// Finish the transition by dialing a new King. The eventual state is
    /// the follow-up's outcome; the state given to `stay`/`to` is only a
    /// fallback if the dispatcher is torn down first.
    #[must_use]
    pub fn then_join(mut self, new_king: DeviceId) -> Self {
        self.follow_up = Some(FollowUp::JoinNewKing(new_king));
        self
    }

    pub(crate) fn into_parts(
        self,
    ) -> (State, bool, Vec<AdminMessage>, Disconnects, Option<FollowUp>) {
        (
            self.next,
            self.entered,
            self.messages,
            self.disconnects,
            self.follow_up,
        )
    }

    #[cfg(test)]
    pub(crate) fn next_state(&self) -> &State {
        &self.next
    }

    #[cfg(test)]
    pub(crate) fn messages(&self) -> &[AdminMessage] {
        &self.messages
    }
}

/// Current state of one device. The state object is the single source of
/// truth for the device's role; role is never inferred from connection
/// counts.
pub enum State {
    /// No kingdom membership.
    Free(FreeState),
    /// Subordinate bound to its King.
    Peasant(PeasantState),
    /// Designated heir, bound to its King.
    Prince(PrinceState),
    /// Coordinating root of a kingdom.
    King(KingState),
}

impl State {
    /// Start state for a fresh device.
    pub fn free() -> Self {
        Self::Free(FreeState::new())
    }

    /// The role this state represents.
    pub fn role(&self) -> Role {
        match self {
            Self::Free(_) => Role::Free,
            Self::Peasant(_) => Role::Peasant,
            Self::Prince(_) => Role::Prince,
            Self::King(_) => Role::King,
        }
    }

    /// The King's device id; `Some` only in subordinate states.
    pub fn king_device(&self) -> Option<&DeviceId> {
        match self {
            Self::Peasant(s) => Some(s.king_device()),
            Self::Prince(s) => Some(s.king_device()),
            Self::Free(_) | Self::King(_) => None,
        }
    }

    /// The connection to the King; `Some` only in subordinate states.
    pub fn king_connection(&self) -> Option<&Arc<dyn Connection>> {
        match self {
            Self::Peasant(s) => Some(s.king_connection()),
            Self::Prince(s) => Some(s.king_connection()),
            Self::Free(_) | Self::King(_) => None,
        }
    }

    /// Dispatch one event to the current state's handler.
    pub async fn on_event(self, session: &mut Session, event: Event) -> Result<Transition> {
        match self {
            Self::Free(state) => state.on_event(session, event).await,
            Self::Peasant(state) => state.on_event(session, event).await,
            Self::Prince(state) => state.on_event(session, event).await,
            Self::King(state) => state.on_event(session, event).await,
        }
    }

    /// Entry action, run once when this state becomes current.
    ///
    /// Configures the acceptor and beacon for the role. The dispatcher
    /// follows this with a replay of the last known census so the fresh
    /// state re-evaluates prior prince/king information immediately.
    pub fn on_enter(&self, session: &Session) {
        match self {
            Self::Free(_) => {
                session.acceptor().start_accepting();
                session.beacon().start();
                session.beacon().set_active_discovery(true);
            }
            Self::Peasant(_) | Self::Prince(_) => {
                // Subordinates stay visible through the beacon but do not
                // probe the network or take inbound connections.
                session.acceptor().stop_accepting();
                session.beacon().start();
                session.beacon().set_active_discovery(false);
            }
            Self::King(_) => {
                session.acceptor().start_accepting();
                session.beacon().start();
                session.beacon().set_active_discovery(true);
            }
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free(_) => f.write_str("FreeState"),
            Self::Peasant(s) => write!(f, "PeasantState({})", s.king_device()),
            Self::Prince(s) => write!(f, "PrinceState({})", s.king_device()),
            Self::King(s) => write!(f, "KingState({} peasants)", s.peasant_count()),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.role())
    }
}
