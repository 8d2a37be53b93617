//! Session events as they appear on the wire between bridge and backend.

use std::fmt;

/// A WebSocket lifecycle event forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsEvent {
    /// An unrecognized event name.
    Unknown,
    /// A new WebSocket client completed its handshake.
    ClientConnected,
    /// A text frame arrived from a WebSocket client.
    MessageReceived,
    /// A WebSocket client disconnected.
    ClientDisconnected,
}

impl WsEvent {
    /// Stable wire name carried in the `ws-event` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            WsEvent::ClientConnected => "client-connected",
            WsEvent::MessageReceived => "message-received",
            WsEvent::ClientDisconnected => "client-disconnected",
            WsEvent::Unknown => "unknown",
        }
    }

    /// Parses a wire name; anything unrecognized maps to [`WsEvent::Unknown`].
    pub fn parse(name: &str) -> WsEvent {
        match name {
            "client-connected" => WsEvent::ClientConnected,
            "message-received" => WsEvent::MessageReceived,
            "client-disconnected" => WsEvent::ClientDisconnected,
            _ => WsEvent::Unknown,
        }
    }
}

impl fmt::Display for WsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event to be delivered to the backend as a single webhook POST.
#[derive(Debug, Clone)]
pub struct BackendMessage {
    /// Session the event belongs to.
    pub session_id: String,
    /// Absolute URL where the backend may POST asynchronous replies.
    pub reply_channel: String,
    /// What happened.
    pub event: WsEvent,
    /// Raw frame payload; empty for connect/disconnect events.
    pub payload: Vec<u8>,
    /// Raw query string captured from the upgrade request.
    pub query_string: String,
    /// JSON-encoded JWT claims when authentication is enabled.
    pub jwt_claims: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(WsEvent::ClientConnected.to_string(), "client-connected");
        assert_eq!(WsEvent::MessageReceived.to_string(), "message-received");
        assert_eq!(WsEvent::ClientDisconnected.to_string(), "client-disconnected");
        assert_eq!(WsEvent::Unknown.to_string(), "unknown");
    }

    #[test]
    fn parse_round_trips_known_events() {
        for event in [
            WsEvent::ClientConnected,
            WsEvent::MessageReceived,
            WsEvent::ClientDisconnected,
        ] {
            assert_eq!(WsEvent::parse(event.as_str()), event);
        }
    }

    #[test]
    fn parse_maps_unrecognized_names_to_unknown() {
        assert_eq!(WsEvent::parse("client-teleported"), WsEvent::Unknown);
        assert_eq!(WsEvent::parse(""), WsEvent::Unknown);
    }
}
