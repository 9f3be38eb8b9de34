//! # ripple-core
//!
//! Connection tracking, room membership, and event routing for the Ripple
//! realtime server.
//!
//! This crate provides the in-memory heart of the system:
//!
//! - **Registry** - which user identity is online on which connection
//! - **RoomManager** - named groups of connections for fan-out
//! - **Hub** - the server context owning both, plus outbound delivery
//! - **PresencePublisher** - broadcasts online/offline transitions
//! - **EventRouter** - dispatches inbound events to their handlers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│ EventRouter │────▶│     Hub     │
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                │
//!                                   ┌────────────┴───────────┐
//!                                   ▼                        ▼
//!                            ┌─────────────┐         ┌─────────────┐
//!                            │  Registry   │         │ RoomManager │
//!                            └─────────────┘         └─────────────┘
//! ```
//!
//! All state lives for the server process only; nothing is persisted.

pub mod connection;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod room;
pub mod router;

pub use connection::{ConnectionHandle, ConnectionId};
pub use hub::{Hub, HubStats};
pub use presence::PresencePublisher;
pub use registry::{ActiveEntry, Registry};
pub use room::{conversation_room, user_room, RoomManager};
pub use router::EventRouter;
