//! Event routing.
//!
//! The router owns the connection lifecycle (`authenticating → connected →
//! disconnected`) and dispatches every inbound event to its handler. Routing
//! is purely identity- and room-addressed; message content is never
//! inspected, and delivery is best-effort to whoever is connected right now.
//!
//! Handlers are synchronous in-memory mutations plus outbound emission, so
//! events from one connection are processed in arrival order by that
//! connection's read loop.

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::hub::Hub;
use crate::presence::PresencePublisher;
use crate::room::{conversation_room, user_room};
use ripple_protocol::{unix_millis, ClientEvent, DeliveryStatus, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Dispatches inbound events and manages connection lifecycle.
#[derive(Debug, Clone)]
pub struct EventRouter {
    hub: Arc<Hub>,
    presence: PresencePublisher,
}

impl EventRouter {
    /// Create a router with its own hub.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hub(Arc::new(Hub::new()))
    }

    /// Create a router over an existing hub.
    #[must_use]
    pub fn with_hub(hub: Arc<Hub>) -> Self {
        let presence = PresencePublisher::new(hub.clone());
        Self { hub, presence }
    }

    /// The hub this router operates on.
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Promote an authenticated transport to a connected session.
    ///
    /// Registers the identity, joins the implicit personal room, and
    /// broadcasts `user:online` to everyone. If the identity was already
    /// online on another connection, that prior connection is evicted: its
    /// outbound channel closes, which ends its transport task. No
    /// `user:offline` is broadcast for an eviction.
    ///
    /// The hub holds the only sender for `outbound`; the caller's receiver
    /// closes when the connection is removed.
    pub fn connect(
        &self,
        user_id: &str,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> ConnectionId {
        let handle = ConnectionHandle::new(user_id, outbound);
        let connection = handle.id();

        if let Some(displaced) = self.hub.registry().register(&handle) {
            warn!(
                user = %user_id,
                old = %displaced.connection,
                new = %connection,
                "Duplicate login, evicting prior connection"
            );
            self.evict(displaced.connection);
        }

        self.hub.insert_connection(handle);
        self.hub.rooms().join(connection, &user_room(user_id));
        self.presence.announce_online(user_id);

        info!(user = %user_id, connection = %connection, "User connected");
        connection
    }

    /// Tear down a connection after its transport closed.
    ///
    /// Safe to call for a connection that was already evicted: the registry
    /// guard keeps a stale close from unregistering a newer login, and no
    /// `user:offline` is broadcast in that case.
    pub fn disconnect(&self, connection: ConnectionId, user_id: &str) {
        self.hub.rooms().leave_all(connection);
        self.hub.remove_connection(connection);

        if self.hub.registry().unregister_if(user_id, connection) {
            self.presence.announce_offline(user_id);
            info!(user = %user_id, connection = %connection, "User disconnected");
        }
    }

    /// Remove a displaced connection from all routing state.
    fn evict(&self, connection: ConnectionId) {
        self.hub.rooms().leave_all(connection);
        self.hub.remove_connection(connection);
    }

    /// Handle one inbound event from a connected client.
    ///
    /// All payload fields are untrusted input. Failures stay local: an
    /// unreachable recipient is a no-op, and partial mutations are not
    /// rolled back.
    pub fn dispatch(&self, origin: ConnectionId, user_id: &str, event: ClientEvent) {
        debug!(connection = %origin, user = %user_id, event = event.name(), "Dispatch");

        match event {
            ClientEvent::MessageSend {
                conversation_id,
                recipient_id,
                content,
                timestamp,
            } => {
                let timestamp = timestamp.unwrap_or_else(unix_millis);
                let message_id = format!("{user_id}-{timestamp}");

                self.hub.broadcast_to_user(
                    &recipient_id,
                    &ServerEvent::MessageReceive {
                        conversation_id: conversation_id.clone(),
                        sender_id: user_id.to_string(),
                        recipient_id: recipient_id.clone(),
                        content,
                        timestamp,
                        status: DeliveryStatus::Delivered,
                    },
                );

                // Confirms the send, not the delivery. Unicast to the
                // origin only, never broadcast, to avoid echo loops.
                self.hub.send_to(
                    origin,
                    ServerEvent::MessageSent {
                        conversation_id,
                        message_id,
                        status: DeliveryStatus::Sent,
                        timestamp,
                    },
                );
            }

            ClientEvent::MessageRead {
                conversation_id,
                message_id,
                sender_id,
            } => {
                self.hub.broadcast_to_user(
                    &sender_id,
                    &ServerEvent::MessageReadReceipt {
                        conversation_id,
                        message_id,
                        read_by: user_id.to_string(),
                        read_at: unix_millis(),
                    },
                );
            }

            ClientEvent::TypingStart {
                conversation_id,
                recipient_id,
            } => {
                self.typing_indicator(user_id, &recipient_id, conversation_id, true);
            }

            ClientEvent::TypingStop {
                conversation_id,
                recipient_id,
            } => {
                self.typing_indicator(user_id, &recipient_id, conversation_id, false);
            }

            ClientEvent::NotificationSend {
                recipient_id,
                kind,
                title,
                message,
                data,
            } => {
                self.hub.broadcast_to_user(
                    &recipient_id,
                    &ServerEvent::NotificationReceive {
                        sender_id: user_id.to_string(),
                        kind,
                        title,
                        message,
                        data,
                        timestamp: unix_millis(),
                    },
                );
            }

            ClientEvent::PresenceGetActive => {
                self.hub.send_to(
                    origin,
                    ServerEvent::ActiveUsers {
                        users: self.hub.registry().online_users(),
                    },
                );
            }

            ClientEvent::PresenceCheckUser { user_id: target } => {
                let status = if self.hub.registry().is_online(&target) {
                    ripple_protocol::PresenceStatus::Online
                } else {
                    ripple_protocol::PresenceStatus::Offline
                };

                self.hub.send_to(
                    origin,
                    ServerEvent::UserStatus {
                        user_id: target,
                        status,
                    },
                );
            }

            ClientEvent::ConversationJoin { conversation_id } => {
                let room = conversation_room(&conversation_id);
                self.hub.rooms().join(origin, &room);

                // The joiner is already a member and hears the announcement.
                self.hub.broadcast_to(
                    &room,
                    &ServerEvent::ConversationUserJoined {
                        conversation_id,
                        user_id: user_id.to_string(),
                        timestamp: unix_millis(),
                    },
                );
            }

            ClientEvent::ConversationLeave { conversation_id } => {
                let room = conversation_room(&conversation_id);
                self.hub.rooms().leave(origin, &room);

                // Announced to the remaining members only.
                self.hub.broadcast_to(
                    &room,
                    &ServerEvent::ConversationUserLeft {
                        conversation_id,
                        user_id: user_id.to_string(),
                        timestamp: unix_millis(),
                    },
                );
            }
        }
    }

    fn typing_indicator(
        &self,
        user_id: &str,
        recipient_id: &str,
        conversation_id: String,
        is_typing: bool,
    ) {
        self.hub.broadcast_to_user(
            recipient_id,
            &ServerEvent::TypingIndicator {
                conversation_id,
                sender_id: user_id.to_string(),
                is_typing,
            },
        );
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_protocol::PresenceStatus;
    use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

    fn connect(router: &EventRouter, user: &str) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = router.connect(user, tx);
        (id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_connect_disconnect_lifecycle() {
        let router = EventRouter::new();

        let (alice, _rx) = connect(&router, "alice");
        assert!(router.hub().registry().is_online("alice"));
        assert!(router
            .hub()
            .rooms()
            .is_member(alice, &user_room("alice")));

        router.disconnect(alice, "alice");
        assert!(!router.hub().registry().is_online("alice"));
        assert_eq!(router.hub().connection_count(), 0);
        assert_eq!(router.hub().rooms().room_count(), 0);
    }

    #[test]
    fn test_presence_broadcast_exactly_once_per_transition() {
        let router = EventRouter::new();
        let (_alice, mut alice_rx) = connect(&router, "alice");

        let (bob, mut bob_rx) = connect(&router, "bob");

        let alice_events = drain(&mut alice_rx);
        let online: Vec<_> = alice_events
            .iter()
            .filter(|e| matches!(e, ServerEvent::UserOnline { user_id, .. } if user_id == "bob"))
            .collect();
        assert_eq!(online.len(), 1);

        // Bob hears his own arrival too: presence goes to every transport.
        let bob_events = drain(&mut bob_rx);
        assert!(bob_events
            .iter()
            .any(|e| matches!(e, ServerEvent::UserOnline { user_id, .. } if user_id == "bob")));

        router.disconnect(bob, "bob");
        let offline: Vec<_> = drain(&mut alice_rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::UserOffline { user_id, .. } if user_id == "bob"))
            .collect();
        assert_eq!(offline.len(), 1);
    }

    #[test]
    fn test_direct_message_delivery() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        let (_bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::MessageSend {
                conversation_id: "c1".into(),
                recipient_id: "bob".into(),
                content: "hi".into(),
                timestamp: Some(1000),
            },
        );

        let bob_events = drain(&mut bob_rx);
        assert_eq!(
            bob_events,
            vec![ServerEvent::MessageReceive {
                conversation_id: "c1".into(),
                sender_id: "alice".into(),
                recipient_id: "bob".into(),
                content: "hi".into(),
                timestamp: 1000,
                status: DeliveryStatus::Delivered,
            }]
        );

        // Sender gets exactly the confirmation, never its own message:receive.
        let alice_events = drain(&mut alice_rx);
        assert_eq!(
            alice_events,
            vec![ServerEvent::MessageSent {
                conversation_id: "c1".into(),
                message_id: "alice-1000".into(),
                status: DeliveryStatus::Sent,
                timestamp: 1000,
            }]
        );
    }

    #[test]
    fn test_message_to_offline_recipient() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        drain(&mut alice_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::MessageSend {
                conversation_id: "c1".into(),
                recipient_id: "nobody".into(),
                content: "hello?".into(),
                timestamp: Some(5),
            },
        );

        // Send is confirmed even though nothing was delivered.
        let events = drain(&mut alice_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::MessageSent { .. }));
    }

    #[test]
    fn test_message_timestamp_defaults_to_now() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        let (_bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let before = unix_millis();
        router.dispatch(
            alice,
            "alice",
            ClientEvent::MessageSend {
                conversation_id: "c1".into(),
                recipient_id: "bob".into(),
                content: "hi".into(),
                timestamp: None,
            },
        );

        match drain(&mut bob_rx).pop().unwrap() {
            ServerEvent::MessageReceive { timestamp, .. } => assert!(timestamp >= before),
            other => panic!("Expected message:receive, got {:?}", other),
        }

        match drain(&mut alice_rx).pop().unwrap() {
            ServerEvent::MessageSent {
                message_id,
                timestamp,
                ..
            } => assert_eq!(message_id, format!("alice-{timestamp}")),
            other => panic!("Expected message:sent, got {:?}", other),
        }
    }

    #[test]
    fn test_typing_indicator_order() {
        let router = EventRouter::new();
        let (alice, _alice_rx) = connect(&router, "alice");
        let (_bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut bob_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::TypingStart {
                conversation_id: "c1".into(),
                recipient_id: "bob".into(),
            },
        );
        router.dispatch(
            alice,
            "alice",
            ClientEvent::TypingStop {
                conversation_id: "c1".into(),
                recipient_id: "bob".into(),
            },
        );

        let events = drain(&mut bob_rx);
        let flags: Vec<bool> = events
            .iter()
            .map(|e| match e {
                ServerEvent::TypingIndicator {
                    sender_id,
                    is_typing,
                    ..
                } => {
                    assert_eq!(sender_id, "alice");
                    *is_typing
                }
                other => panic!("Expected typing:indicator, got {:?}", other),
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_read_receipt_routed_to_original_sender() {
        let router = EventRouter::new();
        let (_alice, mut alice_rx) = connect(&router, "alice");
        let (bob, _bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);

        router.dispatch(
            bob,
            "bob",
            ClientEvent::MessageRead {
                conversation_id: "c1".into(),
                message_id: "alice-1000".into(),
                sender_id: "alice".into(),
            },
        );

        match drain(&mut alice_rx).pop().unwrap() {
            ServerEvent::MessageReadReceipt {
                message_id,
                read_by,
                ..
            } => {
                assert_eq!(message_id, "alice-1000");
                assert_eq!(read_by, "bob");
            }
            other => panic!("Expected message:read-receipt, got {:?}", other),
        }
    }

    #[test]
    fn test_notification_routed_to_recipient() {
        let router = EventRouter::new();
        let (alice, _alice_rx) = connect(&router, "alice");
        let (_bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut bob_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::NotificationSend {
                recipient_id: "bob".into(),
                kind: "invite".into(),
                title: "Hey".into(),
                message: "Join c1".into(),
                data: Some(serde_json::json!({"conversationId": "c1"})),
            },
        );

        match drain(&mut bob_rx).pop().unwrap() {
            ServerEvent::NotificationReceive {
                sender_id, kind, ..
            } => {
                assert_eq!(sender_id, "alice");
                assert_eq!(kind, "invite");
            }
            other => panic!("Expected notification:receive, got {:?}", other),
        }
    }

    #[test]
    fn test_conversation_membership_and_broadcasts() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        let (bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::ConversationJoin {
                conversation_id: "c1".into(),
            },
        );
        // The joiner hears their own join announcement.
        assert!(matches!(
            drain(&mut alice_rx).pop().unwrap(),
            ServerEvent::ConversationUserJoined { ref user_id, .. } if user_id == "alice"
        ));

        router.dispatch(
            bob,
            "bob",
            ClientEvent::ConversationJoin {
                conversation_id: "c1".into(),
            },
        );
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        // A room broadcast reaches both members.
        let room = conversation_room("c1");
        assert_eq!(
            router
                .hub()
                .broadcast_to(&room, &ServerEvent::user_online("x", 1)),
            2
        );
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::ConversationLeave {
                conversation_id: "c1".into(),
            },
        );

        // Only the remaining member hears the departure.
        assert!(drain(&mut alice_rx).is_empty());
        assert!(matches!(
            drain(&mut bob_rx).pop().unwrap(),
            ServerEvent::ConversationUserLeft { ref user_id, .. } if user_id == "alice"
        ));

        // Subsequent broadcasts reach only bob.
        assert_eq!(
            router
                .hub()
                .broadcast_to(&room, &ServerEvent::user_online("x", 1)),
            1
        );
    }

    #[test]
    fn test_presence_get_active_idempotent() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        let (_bob, _bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);

        let mut snapshots = Vec::new();
        for _ in 0..2 {
            router.dispatch(alice, "alice", ClientEvent::PresenceGetActive);
            match drain(&mut alice_rx).pop().unwrap() {
                ServerEvent::ActiveUsers { users } => {
                    let mut ids: Vec<String> = users.into_iter().map(|u| u.user_id).collect();
                    ids.sort();
                    snapshots.push(ids);
                }
                other => panic!("Expected presence:active-users, got {:?}", other),
            }
        }

        assert_eq!(snapshots[0], snapshots[1]);
        assert_eq!(snapshots[0], vec!["alice", "bob"]);
    }

    #[test]
    fn test_presence_check_user() {
        let router = EventRouter::new();
        let (alice, mut alice_rx) = connect(&router, "alice");
        let (_bob, _bob_rx) = connect(&router, "bob");
        drain(&mut alice_rx);

        router.dispatch(
            alice,
            "alice",
            ClientEvent::PresenceCheckUser {
                user_id: "bob".into(),
            },
        );
        assert!(matches!(
            drain(&mut alice_rx).pop().unwrap(),
            ServerEvent::UserStatus { status: PresenceStatus::Online, .. }
        ));

        router.dispatch(
            alice,
            "alice",
            ClientEvent::PresenceCheckUser {
                user_id: "carol".into(),
            },
        );
        assert!(matches!(
            drain(&mut alice_rx).pop().unwrap(),
            ServerEvent::UserStatus { status: PresenceStatus::Offline, .. }
        ));
    }

    #[test]
    fn test_duplicate_login_evicts_prior_connection() {
        let router = EventRouter::new();
        let (first, mut first_rx) = connect(&router, "alice");
        let (_bob, mut bob_rx) = connect(&router, "bob");
        drain(&mut first_rx);
        drain(&mut bob_rx);

        let (second, _second_rx) = connect(&router, "alice");

        // The first connection's channel closes once queued events drain.
        loop {
            match first_rx.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => panic!("Evicted channel should be closed"),
            }
        }

        // Identity now resolves to the new connection; no offline was seen.
        assert_eq!(
            router.hub().registry().get("alice").unwrap().connection,
            second
        );
        assert!(!drain(&mut bob_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::UserOffline { .. })));

        // The stale transport closing later must not log alice out.
        router.disconnect(first, "alice");
        assert!(router.hub().registry().is_online("alice"));
        assert!(!drain(&mut bob_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::UserOffline { .. })));

        router.disconnect(second, "alice");
        assert!(!router.hub().registry().is_online("alice"));
        assert!(drain(&mut bob_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::UserOffline { user_id, .. } if user_id == "alice")));
    }
}
