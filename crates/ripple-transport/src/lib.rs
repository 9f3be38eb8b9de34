//! # ripple-transport
//!
//! Transport layer for the Ripple realtime server.
//!
//! Two transports feed the same router:
//!
//! - **WebSocket** - the primary transport; one task per connection drives
//!   the socket and the outbound delivery queue
//! - **Long-polling** - the fallback for clients that cannot hold a
//!   WebSocket open; sessions queue outbound events until the next poll
//!
//! Both pass the same authentication gate before the router ever sees the
//! connection: the handshake must carry a non-empty `token` and `userId`.

pub mod auth;
pub mod negotiate;
pub mod polling;
pub mod websocket;

pub use auth::{AuthError, ConnectParams, Credentials};
pub use negotiate::{negotiate_transport, SUPPORTED_TRANSPORTS};
pub use polling::{PollingError, PollingSessions};
pub use websocket::{serve_connection, SessionEnd};
