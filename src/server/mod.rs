//! Frontend HTTP server: WebSocket upgrades on one path, per-session reply
//! POSTs on another, one shared session registry between them.

pub mod tls;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthError, JwtAuthorizer, JwtClaims};
use crate::backend::client::{CLOSE_CODE_HEADER, CLOSE_REASON_HEADER, COMMAND_HEADER, TERMINATE_SESSION_COMMAND};
use crate::backend::close::{parse_close_code, parse_close_reason};
use crate::backend::{Backend, WebhookBackend};
use crate::config::Config;
use crate::frontend::WsConn;
use crate::session::registry::Registry;
use crate::session::{Session, SessionParams};

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TLS material: {0}")]
    Tls(#[from] rustls::Error),

    #[error("no private key found in key file")]
    NoPrivateKey,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// State shared by the two HTTP surfaces.
#[derive(Clone)]
struct AppState {
    registry: Registry,
    backend: Arc<dyn Backend>,
    reply_url: String,
}

/// JSON envelope returned by the reply endpoint.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl SessionResponse {
    fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    fn failure(message: &'static str) -> Self {
        Self {
            success: false,
            message: Some(message),
        }
    }
}

/// The WebSocket-to-webhook bridge server.
pub struct BridgeServer {
    config: Config,
    state: AppState,
    authorizer: Option<Arc<JwtAuthorizer>>,
}

impl BridgeServer {
    /// Builds the server from a validated configuration. Resolves JWT key
    /// material up front when authentication is enabled.
    pub async fn new(config: Config) -> Result<Self, ServeError> {
        let authorizer = match &config.jwt {
            Some(jwt) => Some(Arc::new(JwtAuthorizer::from_config(jwt).await?)),
            None => None,
        };

        let state = AppState {
            registry: Registry::new(),
            backend: Arc::new(WebhookBackend::new(config.backend_url.clone())),
            reply_url: config.reply_channel.reply_url(),
        };

        Ok(Self {
            config,
            state,
            authorizer,
        })
    }

    /// Builds the router with both routes.
    pub fn router(&self) -> Router {
        let reply_path = format!(
            "{}/{{id}}",
            self.config.reply_channel.path_prefix.trim_end_matches('/')
        );

        let mut upgrade_route = get(upgrade_handler);
        if let Some(authorizer) = &self.authorizer {
            upgrade_route = upgrade_route.route_layer(middleware::from_fn_with_state(
                authorizer.clone(),
                jwt_auth_middleware,
            ));
        }

        Router::new()
            .route(&self.config.ws_path, upgrade_route)
            .route(&reply_path, post(reply_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Binds the configured listener and serves until shutdown.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), ServeError> {
        let address = normalize_listener(&self.config.ws_listener);
        let listener = TcpListener::bind(&address).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already-bound listener until shutdown.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        let app = self.router();

        info!(
            address = %listener.local_addr()?,
            backend_url = %self.config.backend_url,
            ws_path = %self.config.ws_path,
            reply_url = %self.state.reply_url,
            "bridge server listening"
        );

        match &self.config.tls {
            Some(tls_config) => tls::serve(listener, tls_config, app, shutdown).await,
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        info!("bridge server shutting down");
                    })
                    .await?;
                Ok(())
            }
        }
    }
}

/// Turns a Go-style `:3000` listener into a bindable address.
fn normalize_listener(listener: &str) -> String {
    match listener.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => listener.to_string(),
    }
}

/// `GET {ws_path}`: create and register the session, then hand the request
/// over to the WebSocket handshake.
///
/// Ordering matters: the session is inserted before the supervisor task
/// starts and before the handshake completes, so a reply POST racing the
/// handshake can already resolve the session id.
async fn upgrade_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    request: Request,
) -> Response {
    let id = Uuid::new_v4().to_string();
    let query_string = request.uri().query().unwrap_or_default().to_string();
    let jwt_claims = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| claims.0.clone());

    let (conn, channels) = WsConn::new(id.clone());

    let session = Session::new(SessionParams {
        id: id.clone(),
        reply_channel: format!("{}/{}", state.reply_url, id),
        query_string,
        jwt_claims,
        connection: conn.clone(),
        backend: state.backend.clone(),
    });

    state.registry.insert(session.clone()).await;

    let supervisor = session.clone();
    tokio::spawn(async move { supervisor.run(channels).await });

    let registry = state.registry.clone();
    let failed_registry = state.registry.clone();
    let failed_conn = conn.clone();
    let failed_id = id.clone();

    ws.on_failed_upgrade(move |err| {
        warn!(session_id = %failed_id, error = %err, "websocket upgrade failed");
        failed_conn.abort();
        tokio::spawn(async move { failed_registry.remove(&failed_id).await });
    })
    .on_upgrade(move |socket| async move {
        if let Err(err) = conn.handle(socket).await {
            error!(session_id = %id, error = %err, "websocket connection ended with error");
        }
        registry.remove(&id).await;
    })
}

/// `POST {prefix}/{id}`: push a message down to the session's client and
/// optionally terminate the session.
///
/// The endpoint reports "accepted", not "delivered": a failed write to the
/// client is logged but still answered with `200`.
async fn reply_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> (StatusCode, Json<SessionResponse>) {
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(err) => {
            warn!(session_id = %id, error = %err, "failed to read reply body");
            return (
                StatusCode::BAD_REQUEST,
                Json(SessionResponse::failure("INVALID_REQUEST")),
            );
        }
    };

    let Some(session) = state.registry.get(&id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(SessionResponse::failure("NOT_FOUND")),
        );
    };

    if !body.is_empty() {
        if let Err(err) = session.send(body.to_vec()).await {
            error!(session_id = %id, error = %err, "reply delivery to client failed");
        }
    }

    if header_str(&headers, COMMAND_HEADER) == Some(TERMINATE_SESSION_COMMAND) {
        let code = match parse_close_code(header_str(&headers, CLOSE_CODE_HEADER).unwrap_or("")) {
            Ok(code) => code,
            Err(err) => {
                warn!(session_id = %id, error = %err, "reply carried invalid close code");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(SessionResponse::failure("INVALID_CLOSE_CODE")),
                );
            }
        };

        let reason =
            match parse_close_reason(header_str(&headers, CLOSE_REASON_HEADER).unwrap_or("")) {
                Ok(reason) => reason,
                Err(err) => {
                    warn!(session_id = %id, error = %err, "reply carried invalid close reason");
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(SessionResponse::failure("INVALID_CLOSE_REASON")),
                    );
                }
            };

        if let Err(err) = session.close(code, reason).await {
            error!(session_id = %id, error = %err, "failed to close session");
        }
    }

    (StatusCode::OK, Json(SessionResponse::ok()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
