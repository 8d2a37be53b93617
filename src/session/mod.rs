//! Per-session state machine bridging one WebSocket to the webhook backend.

pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::backend::{Backend, BackendMessage, SessionHandle, WsEvent};
use crate::error::BridgeError;
use crate::frontend::{ConnectionSignal, WsChannels, WsConn};

/// Everything needed to construct a [`Session`].
pub struct SessionParams {
    /// Unique session identifier.
    pub id: String,
    /// Absolute URL where the backend may POST replies for this session.
    pub reply_channel: String,
    /// Raw query string from the upgrade request.
    pub query_string: String,
    /// JSON-encoded JWT claims when authentication is enabled.
    pub jwt_claims: Option<String>,
    /// The client connection this session owns.
    pub connection: Arc<WsConn>,
    /// Shared webhook delivery client.
    pub backend: Arc<dyn Backend>,
}

/// One live WebSocket session. Cheap to clone; all clones share the same
/// connection and identity.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    reply_channel: String,
    query_string: String,
    jwt_claims: Option<String>,
    connection: Arc<WsConn>,
    backend: Arc<dyn Backend>,
}

impl Session {
    pub fn new(params: SessionParams) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: params.id,
                reply_channel: params.reply_channel,
                query_string: params.query_string,
                jwt_claims: params.jwt_claims,
                connection: params.connection,
                backend: params.backend,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn reply_channel(&self) -> &str {
        &self.inner.reply_channel
    }

    /// Writes one text frame to the client.
    pub async fn send(&self, payload: Vec<u8>) -> Result<(), BridgeError> {
        debug!(session_id = %self.inner.id, bytes = payload.len(), "sending message to client");
        self.inner.connection.send(payload).await
    }

    /// Closes the client connection with the given close frame.
    pub async fn close(&self, code: u16, reason: String) -> Result<(), BridgeError> {
        debug!(session_id = %self.inner.id, code, "closing websocket connection");
        self.inner.connection.close(code, reason).await
    }

    /// Supervises the session: announces the connection, forwards inbound
    /// frames in arrival order, and reports the disconnect.
    ///
    /// Delivery failures are logged and counted but never terminate the
    /// session; only a `Closed` signal does. Every session that reached
    /// `Ready` produces exactly one `ClientDisconnected` event on exit.
    pub async fn run(&self, mut channels: WsChannels) {
        match channels.signal.recv().await {
            Some(ConnectionSignal::Ready) => {}
            Some(ConnectionSignal::Closed) | None => {
                debug!(session_id = %self.inner.id, "connection closed before becoming ready");
                return;
            }
        }

        info!(session_id = %self.inner.id, "session started");

        if let Err(err) = self.deliver(WsEvent::ClientConnected, Vec::new()).await {
            error!(session_id = %self.inner.id, error = %err, "client connected delivery failed");
        }

        let mut receiver_open = true;
        loop {
            tokio::select! {
                // Drain buffered frames before acting on a close, so no
                // received message is dropped behind the disconnect event.
                biased;

                inbound = channels.receiver.recv(), if receiver_open => match inbound {
                    Some(payload) => {
                        debug!(session_id = %self.inner.id, bytes = payload.len(), "forwarding client message to backend");
                        if let Err(err) = self.deliver(WsEvent::MessageReceived, payload).await {
                            error!(session_id = %self.inner.id, error = %err, "message delivery failed");
                        }
                    }
                    None => receiver_open = false,
                },

                signal = channels.signal.recv() => match signal {
                    Some(ConnectionSignal::Ready) => {}
                    Some(ConnectionSignal::Closed) | None => break,
                },
            }
        }

        info!(session_id = %self.inner.id, "session finished");

        if let Err(err) = self.deliver(WsEvent::ClientDisconnected, Vec::new()).await {
            error!(session_id = %self.inner.id, error = %err, "client disconnected delivery failed");
        }
    }

    async fn deliver(&self, event: WsEvent, payload: Vec<u8>) -> Result<(), BridgeError> {
        let msg = BackendMessage {
            session_id: self.inner.id.clone(),
            reply_channel: self.inner.reply_channel.clone(),
            event,
            payload,
            query_string: self.inner.query_string.clone(),
            jwt_claims: self.inner.jwt_claims.clone(),
        };
        self.inner.backend.send(msg, self).await
    }
}

#[async_trait]
impl SessionHandle for Session {
    async fn send(&self, payload: Vec<u8>) -> Result<(), BridgeError> {
        Session::send(self, payload).await
    }

    async fn close(&self, code: u16, reason: String) -> Result<(), BridgeError> {
        Session::close(self, code, reason).await
    }
}
