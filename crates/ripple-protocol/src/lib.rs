//! # ripple-protocol
//!
//! Wire event contract for the Ripple realtime server.
//!
//! Every message exchanged with a client is a JSON envelope of the form
//! `{ "event": <name>, "data": <payload> }`. This crate defines the closed
//! set of inbound and outbound events and the envelope codec.
//!
//! ## Event directions
//!
//! - [`ClientEvent`] - events a client sends to the server
//!   (`message:send`, `conversation:join`, `presence:get-active`, ...)
//! - [`ServerEvent`] - events the server emits to clients
//!   (`message:receive`, `user:online`, `typing:indicator`, ...)
//!
//! ## Example
//!
//! ```rust
//! use ripple_protocol::{envelope, ClientEvent};
//!
//! let text = r#"{"event":"conversation:join","data":{"conversationId":"c1"}}"#;
//! let event = envelope::decode(text).unwrap();
//! assert!(matches!(event, ClientEvent::ConversationJoin { .. }));
//! ```

pub mod envelope;
pub mod events;
pub mod time;

pub use envelope::{decode, decode_with_limit, encode, ProtocolError, MAX_EVENT_SIZE};
pub use events::{ClientEvent, DeliveryStatus, PresenceStatus, ServerEvent, UserPresence};
pub use time::unix_millis;
