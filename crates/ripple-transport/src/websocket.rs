//! WebSocket connection driver.
//!
//! One task per connection owns both directions: inbound frames are decoded
//! and dispatched in arrival order, and the connection's outbound queue is
//! drained into the socket. The task exits on transport close, transport
//! error, or eviction (the hub dropping the outbound sender), and all three
//! paths run the same disconnect cleanup.

use crate::auth::Credentials;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use ripple_core::EventRouter;
use ripple_protocol::envelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why a WebSocket session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the socket, or the stream ended cleanly.
    Closed,
    /// The server evicted this connection for a newer login.
    Evicted,
    /// A transport-level fault ended the session.
    TransportError,
}

/// Drive an authenticated WebSocket until it closes.
///
/// Connects the session to the router, relays events in both directions,
/// and tears the session down when the socket goes away. Inbound envelopes
/// larger than `max_event_size` are dropped. Returns why the session ended
/// so the caller can account for transport faults.
pub async fn serve_connection(
    socket: WebSocket,
    router: Arc<EventRouter>,
    credentials: Credentials,
    max_event_size: usize,
) -> SessionEnd {
    let user_id = credentials.user_id().to_string();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let connection = router.connect(&user_id, outbound_tx);

    debug!(connection = %connection, user = %user_id, "WebSocket session started");

    let (mut sink, mut stream) = socket.split();

    let end = loop {
        tokio::select! {
            biased;

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(event) => match envelope::encode(&event) {
                        Ok(text) => {
                            if sink.send(Message::Text(text)).await.is_err() {
                                break SessionEnd::TransportError;
                            }
                        }
                        Err(e) => {
                            warn!(connection = %connection, error = %e, "Failed to encode event");
                        }
                    },
                    // Outbound channel closed: this connection was evicted
                    // by a newer login for the same identity.
                    None => {
                        debug!(connection = %connection, "Evicted, closing socket");
                        let _ = sink.send(Message::Close(None)).await;
                        break SessionEnd::Evicted;
                    }
                }
            }

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match envelope::decode_with_limit(&text, max_event_size) {
                            Ok(event) => router.dispatch(connection, &user_id, event),
                            // Bad input from one client never disturbs others;
                            // the envelope is dropped and the loop continues.
                            Err(e) => {
                                warn!(connection = %connection, error = %e, "Ignoring malformed event");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %connection, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break SessionEnd::TransportError;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection, "Received close frame");
                        break SessionEnd::Closed;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection, error = %e, "WebSocket error");
                        break SessionEnd::TransportError;
                    }
                    None => {
                        debug!(connection = %connection, "WebSocket stream ended");
                        break SessionEnd::Closed;
                    }
                }
            }
        }
    };

    router.disconnect(connection, &user_id);
    debug!(connection = %connection, user = %user_id, reason = ?end, "WebSocket session ended");
    end
}
