//! The dialing boundary between the connection manager and a transport.

use std::sync::Arc;

use async_trait::async_trait;
use coronet_protocol::DeviceId;

use crate::connection::Connection;
use crate::error::Result;

/// Transport-specific dialing.
///
/// The connector owns the actual socket or radio setup for reaching a
/// device by id; the connection manager layers retry policy on top and
/// never cares how the bytes flow.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new connection to the given device.
    ///
    /// One attempt only; bounded retries are the manager's concern.
    async fn dial(&self, device: &DeviceId) -> Result<Arc<dyn Connection>>;
}
