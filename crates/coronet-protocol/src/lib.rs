//! Coronet Protocol - Administrative messages for the Coronet mesh
//!
//! This crate defines the identity and role types shared by every layer of
//! the mesh, the census snapshot format, and the closed set of admin
//! control messages with their wire codec.
//!
//! # Overview
//!
//! A kingdom is coordinated through four control messages:
//!
//! - [`AdminMessage::Census`]: the King's snapshot of every known device
//!   and its role, giving all members a shared view of the topology.
//! - [`AdminMessage::PronouncePrince`]: the King designates an heir.
//! - [`AdminMessage::AckPronouncePrince`]: the designated heir confirms.
//! - [`AdminMessage::BowDownToNewKing`]: a losing King redirects its
//!   kingdom to the winner of a merge.
//!
//! The codec favors partial information over total failure: a damaged
//! census clause costs only that clause, never the whole snapshot.

pub mod census;
pub mod error;
pub mod message;
pub mod types;

pub use census::Census;
pub use error::{Error, Result};
pub use message::{AdminMessage, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN};
pub use types::{ConnectionAccomplishmentType, DeviceId, Role};
