//! Envelope codec for Ripple events.
//!
//! Events travel as JSON text, one envelope per transport message. There is
//! no additional framing; the transport's own message boundaries delimit
//! envelopes.

use crate::events::{ClientEvent, ServerEvent};
use thiserror::Error;

/// Default maximum accepted envelope size (64 KiB).
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Envelope exceeds the size limit in force.
    #[error("Event size {size} exceeds maximum {max}")]
    EventTooLarge { size: usize, max: usize },

    /// Envelope is not valid JSON or does not match any known event.
    #[error("Malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode an outbound event to JSON text.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an inbound event from JSON text with the default size limit.
///
/// # Errors
///
/// Returns an error if the text is too large, is not valid JSON, or names
/// an unknown event.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    decode_with_limit(text, MAX_EVENT_SIZE)
}

/// Decode an inbound event from JSON text, enforcing a configured size
/// limit.
///
/// # Errors
///
/// Returns an error if the text exceeds `max_size`, is not valid JSON, or
/// names an unknown event.
pub fn decode_with_limit(text: &str, max_size: usize) -> Result<ClientEvent, ProtocolError> {
    if text.len() > max_size {
        return Err(ProtocolError::EventTooLarge {
            size: text.len(),
            max: max_size,
        });
    }
    Ok(serde_json::from_str(text)?)
}
