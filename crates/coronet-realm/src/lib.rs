//! Coronet Realm - The connection state machine of the mesh
//!
//! This crate decides what a device *is*: Free, Peasant, Prince or King.
//! States consume a strictly ordered event queue (connections appearing
//! and disappearing, decoded admin messages, discovery observations,
//! timers) and return transitions whose outputs are explicit: messages to
//! broadcast, connections to tear down and an optional order to join a
//! new King. A single dispatcher task per device applies those outputs in
//! a fixed order, which is what makes a kingdom merge safe: the bow-down
//! broadcast always leaves before the old kingdom's connections vanish.
//!
//! # Lifecycle
//!
//! A device starts Free and scans. Finding a King it joins as a Peasant;
//! finding nothing within the discovery window it crowns itself. The King
//! designates the Peasant with the smallest id as Prince, and when the
//! King dies the Prince waits out a crowning preparation grace period and
//! takes the throne while the Peasants follow it there. Two kingdoms that
//! meet merge under whichever King has the smaller device id.

pub mod beacon;
pub mod config;
pub mod error;
pub mod event;
pub mod realm;
pub mod session;
pub mod state;

pub use beacon::{Acceptor, Beacon, NullAcceptor, NullBeacon};
pub use config::RealmConfig;
pub use error::{Error, Result};
pub use event::{DiscoveryEvent, Event, TimeoutEvent};
pub use realm::{Realm, RealmHandle};
pub use session::Session;
pub use state::{
    Disconnects, FollowUp, FreeState, KingState, PeasantState, PrinceState, State, Transition,
};
