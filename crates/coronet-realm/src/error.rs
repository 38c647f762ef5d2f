//! Error types for coronet-realm.

use coronet_protocol::{DeviceId, Role};
use coronet_transport::ConnectionId;
use thiserror::Error;

/// Result type for coronet-realm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection state machine.
///
/// Nothing here ever terminates the process: the dispatcher logs the
/// error, reports it to observers and resolves the device into a
/// well-defined next state.
#[derive(Debug, Error)]
pub enum Error {
    /// An established connection that is neither the expected King
    /// connection nor tracked by the connection manager arrived while in
    /// a subordinate role. This indicates an inconsistent session.
    #[error("protocol violation in {role} state: unexpected untracked connection {connection} to {device}")]
    ProtocolViolation {
        role: Role,
        connection: ConnectionId,
        device: DeviceId,
    },
}
