//! Process-wide map of live sessions.
//!
//! Sessions are inserted before their read loop starts, so a reply POST that
//! races the handshake either misses the session entirely (404) or finds a
//! session whose read loop is about to run. The active-sessions gauge is
//! updated under the same lock that mutates the map, keeping it equal to the
//! map size at all times.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::observability::metrics;
use crate::session::Session;

/// Concurrent `session id → session` map.
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under its id.
    pub async fn insert(&self, session: Session) {
        let mut sessions = self.sessions.write().await;
        debug!(session_id = session.id(), "session registered");
        sessions.insert(session.id().to_string(), session);
        metrics::set_active_sessions(sessions.len());
    }

    /// Removes a session; removing an unknown id is a no-op.
    pub async fn remove(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            debug!(session_id = id, "session removed");
        }
        metrics::set_active_sessions(sessions.len());
    }

    /// Looks up a live session.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::{Backend, BackendMessage, SessionHandle};
    use crate::error::BridgeError;
    use crate::frontend::WsConn;
    use crate::session::SessionParams;

    struct NullBackend;

    #[async_trait]
    impl Backend for NullBackend {
        async fn send(
            &self,
            _msg: BackendMessage,
            _session: &dyn SessionHandle,
        ) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    fn session(id: &str) -> Session {
        let (connection, _unused) = WsConn::new(id.to_string());
        Session::new(SessionParams {
            id: id.to_string(),
            reply_channel: format!("http://bridge/reply/{id}"),
            query_string: String::new(),
            jwt_claims: None,
            connection,
            backend: Arc::new(NullBackend),
        })
    }

    #[tokio::test]
    async fn insert_then_get_then_remove() {
        let registry = Registry::new();

        registry.insert(session("a")).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("a").await.is_some());

        registry.remove("a").await;
        assert!(registry.get("a").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let registry = Registry::new();

        registry.insert(session("a")).await;
        registry.remove("a").await;
        registry.remove("a").await;

        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_id_misses() {
        let registry = Registry::new();
        assert!(registry.get("does-not-exist").await.is_none());
    }
}
