//! Admin message transport: framed send, per-connection reader loops and
//! the admin broadcast channel.
//!
//! Reader loops are the only place raw bytes become typed events. Each
//! registered connection gets one loop task that accumulates bytes,
//! decodes complete frames and forwards [`TransportEvent`]s into the
//! owning device's event queue. Loops never mutate protocol state.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use coronet_protocol::{AdminMessage, DeviceId};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::connection::{Connection, ConnectionId, DisconnectNotice};
use crate::error::{Error, Result};

/// Events surfaced by the transport layer to the state machine.
#[derive(Debug)]
pub enum TransportEvent {
    /// A connection was registered with the connection manager.
    ConnectionEstablished(Arc<dyn Connection>),
    /// A tracked connection disconnected.
    ConnectionClosed(DisconnectNotice),
    /// A decoded admin message arrived on a tracked connection.
    Admin {
        /// Device the message arrived from.
        from: DeviceId,
        /// Connection it arrived on.
        connection: ConnectionId,
        /// The decoded message.
        message: AdminMessage,
    },
}

/// Send one framed admin message over a connection.
pub async fn send_message(conn: &dyn Connection, message: &AdminMessage) -> Result<()> {
    conn.write_all(&message.encode()?).await
}

const READ_CHUNK: usize = 4096;

/// Run the reader loop for one connection until it dies.
///
/// Timeouts are idle keepalive, not failure; fatal errors have already
/// disconnected the connection, and the disconnect latch delivers the
/// closed event, so the loop just exits.
pub async fn reader_loop(conn: Arc<dyn Connection>, events: mpsc::UnboundedSender<TransportEvent>) {
    let mut acc = BytesMut::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        // Drain every complete frame before reading more bytes.
        loop {
            match AdminMessage::decode(&acc) {
                Ok((message, consumed)) => {
                    acc.advance(consumed);
                    trace!(
                        connection = %conn.id(),
                        from = %conn.remote_device(),
                        classifier = message.classifier(),
                        "admin message received"
                    );
                    let event = TransportEvent::Admin {
                        from: conn.remote_device().clone(),
                        connection: conn.id(),
                        message,
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
                Err(coronet_protocol::Error::Truncated { .. }) => break,
                Err(e) => {
                    warn!(connection = %conn.id(), error = %e, "corrupt admin frame, disconnecting");
                    conn.disconnect();
                    return;
                }
            }
        }

        match conn.read(&mut chunk).await {
            Ok(n) => acc.extend_from_slice(&chunk[..n]),
            Err(Error::Timeout) => continue,
            Err(e) => {
                debug!(connection = %conn.id(), error = %e, "reader loop ending");
                return;
            }
        }
    }
}

/// Fan-out publish point for admin messages.
///
/// Posting delivers the encoded message to every connection currently
/// held by the device. Per-connection send failures are skipped: a fatal
/// error has already torn that connection down through its own failure
/// policy and the closed event will follow.
#[derive(Clone)]
pub struct AdminBroadcastChannel {
    manager: crate::manager::ConnectionManager,
}

impl AdminBroadcastChannel {
    /// Create a broadcast channel over the given manager's connections.
    pub fn new(manager: crate::manager::ConnectionManager) -> Self {
        Self { manager }
    }

    /// Post a message to every currently-held connection.
    pub async fn post(&self, message: &AdminMessage) {
        let connections = self.manager.all_connections();
        trace!(
            classifier = message.classifier(),
            fan_out = connections.len(),
            "posting admin broadcast"
        );
        for conn in connections {
            if let Err(e) = send_message(conn.as_ref(), message).await {
                debug!(
                    connection = %conn.id(),
                    device = %conn.remote_device(),
                    error = %e,
                    "skipping broadcast target"
                );
            }
        }
    }

}
