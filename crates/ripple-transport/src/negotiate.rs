//! Transport negotiation.
//!
//! Before connecting, a client can ask which transport to use. The server
//! intersects the client's declared capabilities with what it offers and
//! answers with the most preferred common transport.

/// Transports this server offers, in preference order.
pub const SUPPORTED_TRANSPORTS: [&str; 2] = ["websocket", "polling"];

/// Negotiate the best transport for a client.
///
/// Walks the server's preference order and returns the first transport the
/// client also supports, or `None` when there is no common transport.
/// Capability names the server does not recognize are ignored.
#[must_use]
pub fn negotiate_transport(
    client_capabilities: &[&str],
    available_transports: &[&str],
) -> Option<&'static str> {
    SUPPORTED_TRANSPORTS.into_iter().find(|transport| {
        client_capabilities.contains(transport) && available_transports.contains(transport)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_preferred_over_polling() {
        assert_eq!(
            negotiate_transport(&["polling", "websocket"], &SUPPORTED_TRANSPORTS),
            Some("websocket")
        );
    }

    #[test]
    fn test_polling_only_client() {
        assert_eq!(
            negotiate_transport(&["polling"], &SUPPORTED_TRANSPORTS),
            Some("polling")
        );
    }

    #[test]
    fn test_no_common_transport() {
        assert_eq!(negotiate_transport(&["sse"], &SUPPORTED_TRANSPORTS), None);
        assert_eq!(negotiate_transport(&[], &SUPPORTED_TRANSPORTS), None);
    }

    #[test]
    fn test_unknown_capabilities_ignored() {
        assert_eq!(
            negotiate_transport(&["carrier-pigeon", "polling"], &SUPPORTED_TRANSPORTS),
            Some("polling")
        );
    }

    #[test]
    fn test_respects_available_subset() {
        // A server that only offers polling never answers websocket.
        assert_eq!(
            negotiate_transport(&["websocket", "polling"], &["polling"]),
            Some("polling")
        );
    }
}
