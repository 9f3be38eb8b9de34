//! Presence publishing.
//!
//! Emits `user:online` / `user:offline` to every connected transport
//! whenever the registry's entry set changes. This is a deliberate
//! broadcast-all: any connected party learns of any other party's
//! transition, and rapid connect/disconnect cycles produce one event pair
//! per cycle with no de-duplication.

use crate::hub::Hub;
use ripple_protocol::{unix_millis, ServerEvent};
use std::sync::Arc;
use tracing::debug;

/// Broadcasts presence transitions derived from registry changes.
#[derive(Debug, Clone)]
pub struct PresencePublisher {
    hub: Arc<Hub>,
}

impl PresencePublisher {
    /// Create a publisher bound to a hub.
    #[must_use]
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Announce that a user came online.
    ///
    /// Returns the number of connections notified.
    pub fn announce_online(&self, user_id: &str) -> usize {
        let notified = self
            .hub
            .broadcast_all(&ServerEvent::user_online(user_id, unix_millis()));
        debug!(user = %user_id, notified, "Presence: online");
        notified
    }

    /// Announce that a user went offline.
    ///
    /// Returns the number of connections notified.
    pub fn announce_offline(&self, user_id: &str) -> usize {
        let notified = self
            .hub
            .broadcast_all(&ServerEvent::user_offline(user_id, unix_millis()));
        debug!(user = %user_id, notified, "Presence: offline");
        notified
    }
}
