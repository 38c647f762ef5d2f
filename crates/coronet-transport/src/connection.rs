//! The connection contract shared by every transport.
//!
//! A connection is an owned duplex byte stream bound to exactly one remote
//! device. It is either connected or permanently closed; recovery always
//! creates a new connection object.
//!
//! # Failure policy
//!
//! Reads and writes distinguish two failure classes. A timeout is returned
//! to the caller with no side effects. Any other I/O failure triggers an
//! implicit [`Connection::disconnect`] before the error propagates, so a
//! broken connection is never left half-open and higher layers never need
//! to close after an error.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use coronet_protocol::DeviceId;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Result;

/// Process-unique connection identity.
///
/// Connection objects are shared as `Arc<dyn Connection>`; the id gives
/// the state machine a stable identity test ("is this my king
/// connection?") without pointer comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Notification fired exactly once when a connection disconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectNotice {
    /// Identity of the closed connection.
    pub connection: ConnectionId,
    /// The remote device the connection was bound to.
    pub device: DeviceId,
}

/// Bidirectional byte stream bound to one remote device.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Process-unique identity of this connection object.
    fn id(&self) -> ConnectionId;

    /// The remote device this connection is bound to.
    fn remote_device(&self) -> &DeviceId;

    /// Whether the connection is still connected.
    fn is_connected(&self) -> bool;

    /// Read up to `buf.len()` bytes, returning how many arrived.
    ///
    /// End of stream is a fatal condition: the connection disconnects
    /// itself and the call fails with [`crate::Error::Closed`].
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Read exactly `buf.len()` bytes.
    async fn read_exact(&self, buf: &mut [u8]) -> Result<()>;

    /// Write all of `buf`.
    async fn write_all(&self, buf: &[u8]) -> Result<()>;

    /// Tear the connection down and release transport resources.
    ///
    /// Idempotent and safe to call concurrently from any task; the
    /// disconnect notification fires exactly once no matter how many
    /// callers race here (an I/O error path and an explicit protocol
    /// decision commonly do).
    fn disconnect(&self);

    /// Register a listener for the disconnect notification.
    ///
    /// If the connection is already disconnected the notice is delivered
    /// immediately.
    fn on_disconnect(&self, listener: mpsc::UnboundedSender<DisconnectNotice>);
}

/// Exactly-once disconnect latch shared by connection implementations.
///
/// Owns the closed flag and the registered listeners; `trip` is the only
/// way to set the flag, and it drains the listeners under the same lock
/// that registration takes, so no notice is ever lost or duplicated.
#[derive(Debug)]
pub struct DisconnectLatch {
    closed: AtomicBool,
    listeners: Mutex<Vec<mpsc::UnboundedSender<DisconnectNotice>>>,
    notify: tokio::sync::Notify,
}

impl DisconnectLatch {
    /// Create an armed latch.
    pub fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        }
    }

    /// Whether the latch has been tripped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Trip the latch. Returns `true` for the single caller that won the
    /// race and should release transport resources and notify.
    pub fn trip(&self, notice: DisconnectNotice) -> bool {
        // Hold the listener lock across the swap so a concurrent
        // subscribe either lands before the drain or observes closed.
        let mut listeners = self.listeners.lock().expect("disconnect latch poisoned");
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        trace!(connection = %notice.connection, device = %notice.device, "connection disconnected");
        for listener in listeners.drain(..) {
            let _ = listener.send(notice.clone());
        }
        self.notify.notify_waiters();
        true
    }

    /// Register a listener, delivering immediately if already tripped.
    pub fn subscribe(
        &self,
        listener: mpsc::UnboundedSender<DisconnectNotice>,
        notice: DisconnectNotice,
    ) {
        let mut listeners = self.listeners.lock().expect("disconnect latch poisoned");
        if self.closed.load(Ordering::Acquire) {
            let _ = listener.send(notice);
        } else {
            listeners.push(listener);
        }
    }

    /// Wait until the latch trips. Returns immediately if already closed.
    pub async fn closed(&self) {
        while !self.is_closed() {
            let notified = self.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for DisconnectLatch {
    fn default() -> Self {
        Self::new()
    }
}
