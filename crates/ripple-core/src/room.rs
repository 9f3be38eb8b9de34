//! Room membership management.
//!
//! Rooms are named groups of connections used to fan a single event out to
//! multiple recipients. Two naming conventions exist:
//!
//! - `user:<identity>` - the implicit personal room, joined automatically
//!   right after authentication and abandoned when the transport closes
//! - `conversation:<id>` - explicit rooms, joined and left by client request
//!
//! Empty rooms are removed rather than lingering.

use crate::connection::ConnectionId;
use dashmap::{DashMap, DashSet};
use tracing::debug;

/// Prefix of implicit per-user rooms.
pub const USER_ROOM_PREFIX: &str = "user:";

/// Prefix of explicit conversation rooms.
pub const CONVERSATION_ROOM_PREFIX: &str = "conversation:";

/// The personal room name for a user identity.
#[must_use]
pub fn user_room(user_id: &str) -> String {
    format!("{USER_ROOM_PREFIX}{user_id}")
}

/// The room name for a conversation.
#[must_use]
pub fn conversation_room(conversation_id: &str) -> String {
    format!("{CONVERSATION_ROOM_PREFIX}{conversation_id}")
}

/// Tracks which connections belong to which rooms.
#[derive(Debug, Default)]
pub struct RoomManager {
    /// Room name to member connections.
    rooms: DashMap<String, DashSet<ConnectionId>>,
    /// Connection to the rooms it belongs to, for close-time cleanup.
    memberships: DashMap<ConnectionId, DashSet<String>>,
}

impl RoomManager {
    /// Create an empty room manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining a room twice is a no-op.
    pub fn join(&self, connection: ConnectionId, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection);
        self.memberships
            .entry(connection)
            .or_default()
            .insert(room.to_string());

        debug!(connection = %connection, room = %room, "Joined room");
    }

    /// Remove a connection from a room.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&self, connection: ConnectionId, room: &str) -> bool {
        if let Some(members) = self.memberships.get(&connection) {
            members.remove(room);
        }

        let removed = if let Some(members) = self.rooms.get(room) {
            let removed = members.remove(&connection).is_some();
            let now_empty = members.is_empty();
            drop(members);
            if now_empty {
                self.rooms.remove_if(room, |_, m| m.is_empty());
            }
            removed
        } else {
            false
        };

        if removed {
            debug!(connection = %connection, room = %room, "Left room");
        }

        removed
    }

    /// Remove a connection from every room it belongs to.
    ///
    /// Returns the rooms that were left. Called once when a transport
    /// closes, covering the personal room and any conversations.
    pub fn leave_all(&self, connection: ConnectionId) -> Vec<String> {
        let Some((_, rooms)) = self.memberships.remove(&connection) else {
            return Vec::new();
        };

        let mut left = Vec::new();
        for room in rooms.iter() {
            if let Some(members) = self.rooms.get(room.as_str()) {
                members.remove(&connection);
                let now_empty = members.is_empty();
                drop(members);
                if now_empty {
                    self.rooms.remove_if(room.as_str(), |_, m| m.is_empty());
                }
            }
            left.push(room.clone());
        }

        debug!(connection = %connection, rooms = left.len(), "Left all rooms");
        left
    }

    /// Snapshot of a room's members. Empty for an absent room.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|m| m.iter().map(|c| *c).collect())
            .unwrap_or_default()
    }

    /// Number of members in a room.
    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Check whether a connection is in a room.
    #[must_use]
    pub fn is_member(&self, connection: ConnectionId, room: &str) -> bool {
        self.rooms
            .get(room)
            .map(|m| m.contains(&connection))
            .unwrap_or(false)
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
