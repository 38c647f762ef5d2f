//! Error types for coronet-transport.

use coronet_protocol::DeviceId;
use thiserror::Error;

/// Result type for coronet-transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on connections and the connection manager.
///
/// The taxonomy matters to callers: [`Error::Timeout`] is transient and
/// leaves the connection connected, while every other I/O failure has
/// already torn the connection down by the time the caller sees it.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write did not complete within the configured I/O timeout.
    /// The connection is still usable.
    #[error("i/o timed out")]
    Timeout,

    /// The connection has been disconnected; it never reconnects.
    #[error("connection closed")]
    Closed,

    /// A fatal I/O error. The connection was disconnected before this
    /// error propagated.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The connector has no way to reach the given device.
    #[error("no route to device {0}")]
    NoRoute(DeviceId),

    /// An admin frame on the wire could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] coronet_protocol::Error),
}
