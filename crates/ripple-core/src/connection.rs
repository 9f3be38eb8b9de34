//! Live connection handles.
//!
//! A [`ConnectionHandle`] is the routing-side view of one transport session:
//! the authenticated identity plus an outbound channel drained by the
//! transport's writer task. Dropping every clone of the handle closes the
//! channel and lets the transport task shut down.

use ripple_protocol::{unix_millis, ServerEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

/// Counter for process-unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection within this server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection ID.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to one live, authenticated connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
    connected_at: u64,
}

impl ConnectionHandle {
    /// Create a handle for a freshly authenticated connection.
    #[must_use]
    pub fn new(user_id: impl Into<String>, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: ConnectionId::next(),
            user_id: user_id.into(),
            sender,
            connected_at: unix_millis(),
        }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the authenticated user identity.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// When this connection was established, in unix milliseconds.
    #[must_use]
    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }

    /// Queue an event for delivery on this connection.
    ///
    /// Returns `false` if the transport side has already gone away; the
    /// event is silently dropped in that case.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        let ok = self.sender.send(event).is_ok();
        if !ok {
            trace!(connection = %self.id, "Dropped event for closed connection");
        }
        ok
    }
}
