//! Coronet Transport - Connections and connection management
//!
//! This crate carries the byte-moving half of the mesh: the
//! [`Connection`] contract every transport implements, a TCP transport,
//! an in-process fabric for tests and simulation, the per-device
//! [`ConnectionManager`], and the [`AdminBroadcastChannel`] that fans
//! admin messages out to every held connection.
//!
//! # Failure policy
//!
//! All connections share one resilience contract: read/write timeouts are
//! returned to the caller with the connection intact, while any other I/O
//! error disconnects the connection before the error propagates. Higher
//! layers never close a connection after an error; it is already closed.
//!
//! # Threading
//!
//! Per-connection reader loops run on their own tasks and only enqueue
//! decoded [`TransportEvent`]s; they never touch protocol state. The
//! disconnect notification is idempotent and safe under concurrent
//! triggering from an I/O error path and an explicit protocol decision.

pub mod admin;
pub mod connection;
pub mod connector;
pub mod error;
pub mod manager;
pub mod memory;
pub mod stream;
pub mod tcp;

pub use admin::{send_message, AdminBroadcastChannel, TransportEvent};
pub use connection::{Connection, ConnectionId, DisconnectNotice};
pub use connector::Connector;
pub use error::{Error, Result};
pub use manager::ConnectionManager;
pub use stream::{StreamConnection, DEFAULT_IO_TIMEOUT};
