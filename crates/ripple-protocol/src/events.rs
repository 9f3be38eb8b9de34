//! Event types for the Ripple protocol.
//!
//! Inbound and outbound events form two closed enums, matched exhaustively
//! by the router. Event names and payload fields follow the wire contract
//! exactly; payload fields are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Delivery status attached to message events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the server and relayed.
    Sent,
    /// Handed to the recipient's live connection.
    Delivered,
}

/// Online/offline status of a user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// One entry in a `presence:active-users` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    /// User identity.
    pub user_id: String,
    /// Always `online` while the entry exists.
    pub status: PresenceStatus,
}

impl UserPresence {
    /// Create an online presence entry.
    #[must_use]
    pub fn online(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: PresenceStatus::Online,
        }
    }
}

/// Events a client sends to the server.
///
/// Payload fields are externally supplied, unvalidated input; handlers must
/// not assume anything beyond their shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Send a direct message to another user.
    #[serde(rename = "message:send")]
    MessageSend {
        conversation_id: String,
        recipient_id: String,
        content: String,
        /// Client timestamp; defaults to server time when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Mark a message as read, notifying its original sender.
    #[serde(rename = "message:read")]
    MessageRead {
        conversation_id: String,
        message_id: String,
        sender_id: String,
    },

    /// The client started typing in a conversation.
    #[serde(rename = "typing:start")]
    TypingStart {
        conversation_id: String,
        recipient_id: String,
    },

    /// The client stopped typing in a conversation.
    #[serde(rename = "typing:stop")]
    TypingStop {
        conversation_id: String,
        recipient_id: String,
    },

    /// Push a notification payload to another user.
    #[serde(rename = "notification:send")]
    NotificationSend {
        recipient_id: String,
        #[serde(rename = "type")]
        kind: String,
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },

    /// Request the full list of online users.
    #[serde(rename = "presence:get-active")]
    PresenceGetActive,

    /// Query a single user's online status.
    #[serde(rename = "presence:check-user")]
    PresenceCheckUser { user_id: String },

    /// Join a conversation room.
    #[serde(rename = "conversation:join")]
    ConversationJoin { conversation_id: String },

    /// Leave a conversation room.
    #[serde(rename = "conversation:leave")]
    ConversationLeave { conversation_id: String },
}

impl ClientEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::MessageSend { .. } => "message:send",
            ClientEvent::MessageRead { .. } => "message:read",
            ClientEvent::TypingStart { .. } => "typing:start",
            ClientEvent::TypingStop { .. } => "typing:stop",
            ClientEvent::NotificationSend { .. } => "notification:send",
            ClientEvent::PresenceGetActive => "presence:get-active",
            ClientEvent::PresenceCheckUser { .. } => "presence:check-user",
            ClientEvent::ConversationJoin { .. } => "conversation:join",
            ClientEvent::ConversationLeave { .. } => "conversation:leave",
        }
    }
}

/// Events the server emits to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// A direct message delivered to its recipient.
    #[serde(rename = "message:receive")]
    MessageReceive {
        conversation_id: String,
        sender_id: String,
        recipient_id: String,
        content: String,
        timestamp: u64,
        status: DeliveryStatus,
    },

    /// Send confirmation, unicast to the origin connection only.
    #[serde(rename = "message:sent")]
    MessageSent {
        conversation_id: String,
        message_id: String,
        status: DeliveryStatus,
        timestamp: u64,
    },

    /// Read receipt delivered to the original message sender.
    #[serde(rename = "message:read-receipt")]
    MessageReadReceipt {
        conversation_id: String,
        message_id: String,
        read_by: String,
        read_at: u64,
    },

    /// Typing state change delivered to the conversation peer.
    #[serde(rename = "typing:indicator")]
    TypingIndicator {
        conversation_id: String,
        sender_id: String,
        is_typing: bool,
    },

    /// Notification delivered to its recipient.
    #[serde(rename = "notification:receive")]
    NotificationReceive {
        sender_id: String,
        #[serde(rename = "type")]
        kind: String,
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        timestamp: u64,
    },

    /// Snapshot of all online users, unicast to the caller.
    #[serde(rename = "presence:active-users")]
    ActiveUsers { users: Vec<UserPresence> },

    /// Single-user status answer, unicast to the caller.
    #[serde(rename = "presence:user-status")]
    UserStatus {
        user_id: String,
        status: PresenceStatus,
    },

    /// A user came online, broadcast to every connection.
    #[serde(rename = "user:online")]
    UserOnline { user_id: String, timestamp: u64 },

    /// A user went offline, broadcast to every connection.
    #[serde(rename = "user:offline")]
    UserOffline { user_id: String, timestamp: u64 },

    /// A user joined a conversation room, broadcast to that room.
    #[serde(rename = "conversation:user-joined")]
    ConversationUserJoined {
        conversation_id: String,
        user_id: String,
        timestamp: u64,
    },

    /// A user left a conversation room, broadcast to that room.
    #[serde(rename = "conversation:user-left")]
    ConversationUserLeft {
        conversation_id: String,
        user_id: String,
        timestamp: u64,
    },
}

impl ServerEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::MessageReceive { .. } => "message:receive",
            ServerEvent::MessageSent { .. } => "message:sent",
            ServerEvent::MessageReadReceipt { .. } => "message:read-receipt",
            ServerEvent::TypingIndicator { .. } => "typing:indicator",
            ServerEvent::NotificationReceive { .. } => "notification:receive",
            ServerEvent::ActiveUsers { .. } => "presence:active-users",
            ServerEvent::UserStatus { .. } => "presence:user-status",
            ServerEvent::UserOnline { .. } => "user:online",
            ServerEvent::UserOffline { .. } => "user:offline",
            ServerEvent::ConversationUserJoined { .. } => "conversation:user-joined",
            ServerEvent::ConversationUserLeft { .. } => "conversation:user-left",
        }
    }

    /// Create a `user:online` broadcast event.
    #[must_use]
    pub fn user_online(user_id: impl Into<String>, timestamp: u64) -> Self {
        ServerEvent::UserOnline {
            user_id: user_id.into(),
            timestamp,
        }
    }

    /// Create a `user:offline` broadcast event.
    #[must_use]
    pub fn user_offline(user_id: impl Into<String>, timestamp: u64) -> Self {
        ServerEvent::UserOffline {
            user_id: user_id.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_names() {
        let event = ClientEvent::ConversationJoin {
            conversation_id: "c1".into(),
        };
        assert_eq!(event.name(), "conversation:join");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "conversation:join", "data": {"conversationId": "c1"}})
        );
    }

    #[test]
    fn test_message_send_decode() {
        let value = json!({
            "event": "message:send",
            "data": {
                "conversationId": "c1",
                "recipientId": "bob",
                "content": "hi",
                "timestamp": 1000
            }
        });

        let event: ClientEvent = serde_json::from_value(value).unwrap();
        assert_eq!(
            event,
            ClientEvent::MessageSend {
                conversation_id: "c1".into(),
                recipient_id: "bob".into(),
                content: "hi".into(),
                timestamp: Some(1000),
            }
        );
    }

    #[test]
    fn test_message_send_timestamp_optional() {
        let value = json!({
            "event": "message:send",
            "data": {
                "conversationId": "c1",
                "recipientId": "bob",
                "content": "hi"
            }
        });

        let event: ClientEvent = serde_json::from_value(value).unwrap();
        assert!(matches!(
            event,
            ClientEvent::MessageSend {
                timestamp: None,
                ..
            }
        ));
    }

    #[test]
    fn test_presence_get_active_without_data() {
        let value = json!({"event": "presence:get-active"});
        let event: ClientEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event, ClientEvent::PresenceGetActive);
    }

    #[test]
    fn test_notification_type_field() {
        let value = json!({
            "event": "notification:send",
            "data": {
                "recipientId": "bob",
                "type": "invite",
                "title": "Hello",
                "message": "Join my conversation"
            }
        });

        let event: ClientEvent = serde_json::from_value(value).unwrap();
        assert!(matches!(
            event,
            ClientEvent::NotificationSend { ref kind, data: None, .. } if kind == "invite"
        ));
    }

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::MessageReceive {
            conversation_id: "c1".into(),
            sender_id: "alice".into(),
            recipient_id: "bob".into(),
            content: "hi".into(),
            timestamp: 1000,
            status: DeliveryStatus::Delivered,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "message:receive",
                "data": {
                    "conversationId": "c1",
                    "senderId": "alice",
                    "recipientId": "bob",
                    "content": "hi",
                    "timestamp": 1000,
                    "status": "delivered"
                }
            })
        );
    }

    #[test]
    fn test_presence_status_serialization() {
        let event = ServerEvent::UserStatus {
            user_id: "bob".into(),
            status: PresenceStatus::Offline,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["data"]["status"], "offline");
    }

    #[test]
    fn test_unknown_event_rejected() {
        let value = json!({"event": "message:unknown", "data": {}});
        assert!(serde_json::from_value::<ClientEvent>(value).is_err());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let value = json!({
            "event": "message:send",
            "data": {"conversationId": "c1", "content": "hi"}
        });
        assert!(serde_json::from_value::<ClientEvent>(value).is_err());
    }
}
