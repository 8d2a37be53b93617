//! Error taxonomy for the bridge.
//!
//! Every kind maps to one policy: webhook delivery failures are counted and
//! logged but never terminate a session; close-directive problems surface as
//! `400` on the reply endpoint; a second `Close` on the same connection is
//! tolerated.

use thiserror::Error;

/// Errors produced by the bridge core (webhook client, WebSocket connection,
/// session supervisor).
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The webhook POST never reached the backend (transport or timeout).
    #[error("backend unreachable: {cause}")]
    BackendUnreachable {
        #[source]
        cause: reqwest::Error,
    },

    /// The backend answered the webhook POST with a non-2xx status.
    #[error("backend rejected delivery to {url} (status {status})")]
    BackendRejected { status: u16, url: String },

    /// A close code or reason from the backend failed validation.
    #[error("invalid close directive: {0}")]
    InvalidCloseDirective(String),

    /// Writing a frame to the WebSocket client failed.
    #[error("websocket write failed: {0}")]
    WebSocketWriteFailed(String),

    /// Reading from the WebSocket client failed outside a normal close.
    #[error("websocket read failed: {0}")]
    WebSocketReadFailed(String),

    /// `Close` was called on a connection that is already closed.
    #[error("connection already closed")]
    AlreadyClosed,

    /// The webhook POST itself succeeded, but applying the backend's
    /// response to the client connection did not.
    #[error("downstream write after backend delivery failed: {cause}")]
    DownstreamWriteFailed {
        #[source]
        cause: Box<BridgeError>,
    },
}
