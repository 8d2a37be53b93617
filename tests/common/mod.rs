//! Shared fixtures: a programmable webhook backend and a running bridge.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

use ws2wh::config::{Config, MetricsConfig, ReplyChannelConfig};
use ws2wh::{BridgeServer, Shutdown};

/// One webhook POST as observed by the test backend.
#[derive(Debug)]
pub struct ReceivedEvent {
    pub event: String,
    pub session_id: String,
    pub reply_channel: String,
    pub query_string: Option<String>,
    pub jwt_claims: Option<String>,
    pub payload: Vec<u8>,
}

/// A canned response the webhook returns for the next POST it receives.
#[derive(Debug, Default)]
pub struct PlannedResponse {
    pub body: Vec<u8>,
    pub headers: Vec<(&'static str, String)>,
}

#[derive(Clone)]
struct WebhookState {
    events: mpsc::Sender<ReceivedEvent>,
    responses: Arc<Mutex<VecDeque<PlannedResponse>>>,
}

/// Programmable webhook backend.
pub struct TestWebhook {
    pub url: String,
    pub events: mpsc::Receiver<ReceivedEvent>,
    responses: Arc<Mutex<VecDeque<PlannedResponse>>>,
}

impl TestWebhook {
    pub async fn start() -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let responses: Arc<Mutex<VecDeque<PlannedResponse>>> = Arc::default();

        let state = WebhookState {
            events: events_tx,
            responses: responses.clone(),
        };

        let app = Router::new()
            .route("/webhook", post(webhook_endpoint))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/webhook"),
            events: events_rx,
            responses,
        }
    }

    /// Queues a response for the next webhook POST.
    pub async fn plan_response(&self, response: PlannedResponse) {
        self.responses.lock().await.push_back(response);
    }

    /// Waits for the next webhook event, failing the test on timeout.
    pub async fn next_event(&mut self) -> ReceivedEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for webhook event")
            .expect("webhook event channel closed")
    }
}

async fn webhook_endpoint(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    state
        .events
        .send(ReceivedEvent {
            event: header("ws-event").unwrap_or_default(),
            session_id: header("ws-session-id").unwrap_or_default(),
            reply_channel: header("ws-reply-channel").unwrap_or_default(),
            query_string: header("ws-query-string"),
            jwt_claims: header("ws-session-jwt-claims"),
            payload: body.to_vec(),
        })
        .await
        .unwrap();

    match state.responses.lock().await.pop_front() {
        Some(planned) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            for (name, value) in planned.headers {
                builder = builder.header(name, value);
            }
            builder.body(axum::body::Body::from(planned.body)).unwrap()
        }
        None => StatusCode::OK.into_response(),
    }
}

/// A bridge bound to an ephemeral port, wired to the given backend URL.
pub struct TestBridge {
    pub ws_url: String,
    pub reply_base: String,
    _shutdown: Shutdown,
}

impl TestBridge {
    pub async fn start(backend_url: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = Config {
            backend_url: backend_url.to_string(),
            ws_listener: format!("127.0.0.1:{port}"),
            ws_path: "/".to_string(),
            log_level: "info".to_string(),
            reply_channel: ReplyChannelConfig {
                path_prefix: "/reply".to_string(),
                hostname: "127.0.0.1".to_string(),
                scheme: "http".to_string(),
                port: port.to_string(),
            },
            metrics: MetricsConfig {
                enabled: false,
                port: 0,
                path: "/metrics".to_string(),
            },
            tls: None,
            jwt: None,
        };

        let server = BridgeServer::new(config).await.unwrap();
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            server.serve(listener, rx).await.unwrap();
        });

        Self {
            ws_url: format!("ws://127.0.0.1:{port}/"),
            reply_base: format!("http://127.0.0.1:{port}/reply"),
            _shutdown: shutdown,
        }
    }
}
