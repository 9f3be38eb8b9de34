//! The hub: server context owning all shared routing state.
//!
//! One hub exists per server instance. It owns the connection table, the
//! registry, and the room manager, and implements every outbound delivery
//! path: unicast to a connection, fan-out to a room or user, and
//! broadcast to all connections. Tests can build isolated hubs freely.

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::registry::Registry;
use crate::room::{user_room, RoomManager};
use dashmap::DashMap;
use ripple_protocol::ServerEvent;
use tracing::trace;

/// Shared routing state for one server instance.
#[derive(Debug, Default)]
pub struct Hub {
    /// All live connections, keyed by connection ID.
    connections: DashMap<ConnectionId, ConnectionHandle>,
    /// Who is online.
    registry: Registry,
    /// Room membership.
    rooms: RoomManager,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The room manager.
    #[must_use]
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Track a new connection.
    pub fn insert_connection(&self, handle: ConnectionHandle) {
        self.connections.insert(handle.id(), handle);
    }

    /// Stop tracking a connection, returning its handle if it was tracked.
    ///
    /// Dropping the returned handle closes the connection's outbound
    /// channel once no other clone remains.
    pub fn remove_connection(&self, connection: ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(&connection).map(|(_, h)| h)
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver an event to a single connection.
    ///
    /// Returns `false` if the connection is unknown or already closed.
    pub fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&connection) {
            Some(handle) => handle.deliver(event),
            None => false,
        }
    }

    /// Fan an event out to every member of a room.
    ///
    /// Broadcasting to an empty or absent room is a no-op. Returns the
    /// number of connections the event was queued for.
    pub fn broadcast_to(&self, room: &str, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for member in self.rooms.members(room) {
            if self.send_to(member, event.clone()) {
                delivered += 1;
            }
        }

        trace!(room = %room, event = event.name(), recipients = delivered, "Room broadcast");
        delivered
    }

    /// Fan an event out to a user's personal room.
    pub fn broadcast_to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        self.broadcast_to(&user_room(user_id), event)
    }

    /// Fan an event out to every live connection.
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for handle in self.connections.iter() {
            if handle.deliver(event.clone()) {
                delivered += 1;
            }
        }

        trace!(event = event.name(), recipients = delivered, "Global broadcast");
        delivered
    }

    /// Snapshot of hub-wide counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            online_users: self.registry.online_count(),
            rooms: self.rooms.room_count(),
        }
    }
}

/// Hub-wide counters, surfaced on the health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct HubStats {
    /// Live connections.
    pub connections: usize,
    /// Online identities.
    pub online_users: usize,
    /// Rooms with at least one member.
    pub rooms: usize,
}
