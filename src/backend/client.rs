//! Webhook delivery client.
//!
//! One [`Backend::send`] call is one HTTP POST to the configured backend URL.
//! The response is interpreted in place: a non-empty body is pushed back to
//! the WebSocket client, and a `ws-command: terminate-session` header closes
//! the session with the validated close code and reason.

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::backend::close::{parse_close_code, parse_close_reason};
use crate::backend::event::{BackendMessage, WsEvent};
use crate::error::BridgeError;
use crate::observability::metrics;

/// Identifies the WebSocket session in webhook requests.
pub const SESSION_ID_HEADER: &str = "ws-session-id";
/// Absolute URL where asynchronous replies for this session are accepted.
pub const REPLY_CHANNEL_HEADER: &str = "ws-reply-channel";
/// Wire name of the event that triggered the POST.
pub const EVENT_HEADER: &str = "ws-event";
/// Raw query string from the upgrade request; present iff non-empty.
pub const QUERY_STRING_HEADER: &str = "ws-query-string";
/// JSON-encoded JWT claims; present iff authentication produced any.
pub const JWT_CLAIMS_HEADER: &str = "ws-session-jwt-claims";
/// Command the backend wants executed on the session.
pub const COMMAND_HEADER: &str = "ws-command";
/// Close code for `terminate-session`; defaults to 1000.
pub const CLOSE_CODE_HEADER: &str = "ws-close-code";
/// Close reason for `terminate-session`; defaults to empty.
pub const CLOSE_REASON_HEADER: &str = "ws-close-reason";

/// Implicit command: deliver the response body to the client.
pub const SEND_MESSAGE_COMMAND: &str = "send-message";
/// Close the WebSocket session.
pub const TERMINATE_SESSION_COMMAND: &str = "terminate-session";

/// Write access to a live session, as seen by the webhook client.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Writes one text frame to the WebSocket client.
    async fn send(&self, payload: Vec<u8>) -> Result<(), BridgeError>;

    /// Closes the WebSocket session with the given close frame.
    async fn close(&self, code: u16, reason: String) -> Result<(), BridgeError>;
}

/// Destination for session events.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Delivers one event and applies whatever the backend answered to the
    /// session.
    async fn send(&self, msg: BackendMessage, session: &dyn SessionHandle) -> Result<(), BridgeError>;
}

/// [`Backend`] implementation that POSTs every event to a webhook URL.
pub struct WebhookBackend {
    url: String,
    client: reqwest::Client,
}

impl WebhookBackend {
    /// Creates a client for the given webhook URL. Connection pooling and
    /// timeouts are left at the HTTP client defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Backend for WebhookBackend {
    async fn send(&self, msg: BackendMessage, session: &dyn SessionHandle) -> Result<(), BridgeError> {
        let BackendMessage {
            session_id,
            reply_channel,
            event,
            payload,
            query_string,
            jwt_claims,
        } = msg;

        let mut request = self
            .client
            .post(&self.url)
            .header(SESSION_ID_HEADER, &session_id)
            .header(REPLY_CHANNEL_HEADER, &reply_channel)
            .header(EVENT_HEADER, event.as_str());

        if !query_string.is_empty() {
            request = request.header(QUERY_STRING_HEADER, &query_string);
        }

        if let Some(claims) = &jwt_claims {
            request = request.header(JWT_CLAIMS_HEADER, claims);
        }

        let response = match request.body(payload).send().await {
            Ok(response) => response,
            Err(cause) => {
                error!(session_id = %session_id, error = %cause, "webhook delivery failed");
                metrics::record_message_failure(metrics::ORIGIN_CLIENT);
                return Err(BridgeError::BackendUnreachable { cause });
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(session_id = %session_id, status = status.as_u16(), "backend rejected delivery");
            // Drain so the pooled connection stays reusable.
            let _ = response.bytes().await;
            metrics::record_message_failure(metrics::ORIGIN_CLIENT);
            return Err(BridgeError::BackendRejected {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        metrics::record_message_delivered(metrics::ORIGIN_CLIENT);

        let command = header_value(&response, COMMAND_HEADER);
        let close_code = header_value(&response, CLOSE_CODE_HEADER);
        let close_reason = header_value(&response, CLOSE_REASON_HEADER);

        let body = response
            .bytes()
            .await
            .map_err(|cause| BridgeError::BackendUnreachable { cause })?;

        // A disconnect event's response goes nowhere: the connection may
        // already be gone, and command headers on it are ignored as well.
        if event == WsEvent::ClientDisconnected {
            return Ok(());
        }

        if !body.is_empty() {
            debug!(session_id = %session_id, bytes = body.len(), "forwarding backend response to client");
            if let Err(cause) = session.send(body.to_vec()).await {
                warn!(session_id = %session_id, error = %cause, "failed to write backend response to client");
                return Err(BridgeError::DownstreamWriteFailed { cause: Box::new(cause) });
            }
        }

        if command.as_deref() == Some(TERMINATE_SESSION_COMMAND) {
            let code = parse_close_code(close_code.as_deref().unwrap_or(""))?;
            let reason = parse_close_reason(close_reason.as_deref().unwrap_or(""))?;

            debug!(session_id = %session_id, code, "backend requested session termination");
            if let Err(cause) = session.close(code, reason).await {
                warn!(session_id = %session_id, error = %cause, "failed to close session on backend command");
                return Err(BridgeError::DownstreamWriteFailed { cause: Box::new(cause) });
            }
        }

        Ok(())
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
