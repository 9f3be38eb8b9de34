//! Connection registry: the source of truth for who is online.
//!
//! The registry maps a user identity to its single live connection. A second
//! connection for the same identity displaces the first; the caller receives
//! the displaced entry and is responsible for evicting that connection.

use crate::connection::{ConnectionHandle, ConnectionId};
use dashmap::DashMap;
use ripple_protocol::UserPresence;
use tracing::debug;

/// A user identity.
pub type UserId = String;

/// Registry entry for one online user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveEntry {
    /// The connection currently serving this identity.
    pub connection: ConnectionId,
    /// When the connection was established, in unix milliseconds.
    pub connected_at: u64,
}

/// Process-wide map of online users. Rebuilt empty on restart.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<UserId, ActiveEntry>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for the handle's identity.
    ///
    /// Returns the displaced entry when the identity was already online on
    /// another connection. That prior connection is no longer reachable by
    /// identity and must be evicted by the caller.
    pub fn register(&self, handle: &ConnectionHandle) -> Option<ActiveEntry> {
        let entry = ActiveEntry {
            connection: handle.id(),
            connected_at: handle.connected_at(),
        };

        let displaced = self.entries.insert(handle.user_id().to_string(), entry);

        debug!(
            user = %handle.user_id(),
            connection = %handle.id(),
            displaced = displaced.is_some(),
            "Registered user"
        );

        displaced
    }

    /// Remove the entry for an identity, whichever connection owns it.
    ///
    /// No-op if the identity is not online.
    pub fn unregister(&self, user_id: &str) -> Option<ActiveEntry> {
        let removed = self.entries.remove(user_id).map(|(_, entry)| entry);
        if removed.is_some() {
            debug!(user = %user_id, "Unregistered user");
        }
        removed
    }

    /// Remove the entry for an identity only if it is still owned by the
    /// given connection.
    ///
    /// Guards the close path against a stale connection that was displaced
    /// by a newer login unregistering the newer entry.
    pub fn unregister_if(&self, user_id: &str, connection: ConnectionId) -> bool {
        let removed = self
            .entries
            .remove_if(user_id, |_, entry| entry.connection == connection)
            .is_some();

        if removed {
            debug!(user = %user_id, connection = %connection, "Unregistered user");
        }

        removed
    }

    /// Check whether an identity is online.
    #[must_use]
    pub fn is_online(&self, user_id: &str) -> bool {
        self.entries.contains_key(user_id)
    }

    /// Look up the entry for an identity.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<ActiveEntry> {
        self.entries.get(user_id).map(|e| *e.value())
    }

    /// Snapshot of all online identities. Status is always online; entries
    /// are not retained once a user disconnects.
    #[must_use]
    pub fn online_users(&self) -> Vec<UserPresence> {
        self.entries
            .iter()
            .map(|e| UserPresence::online(e.key().clone()))
            .collect()
    }

    /// Number of online users.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.entries.len()
    }
}
