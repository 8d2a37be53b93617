//! One WebSocket connection: read loop, serialized writes, lifecycle signals.
//!
//! The read loop is the single reader and pushes inbound text frames into a
//! bounded channel consumed by the session supervisor; when the supervisor
//! stalls, the read loop blocks on the channel send and backpressure reaches
//! the client through the TCP receive window. Writes can come from several
//! tasks at once (reply POSTs, inline webhook responses, close commands) and
//! serialize on the connection's write lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::observability::metrics;

/// Capacity of the inbound frame channel.
const RECEIVER_BUFFER: usize = 64;

/// Close codes treated as a normal client-initiated closure. 1005 stands for
/// a close frame that carried no status code at all.
const NORMAL_CLOSE_CODES: [u16; 3] = [1000, 1001, 1005];

/// Lifecycle transition reported by the read loop to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// The handshake completed and frames may flow.
    Ready,
    /// The connection is gone; no further frames will be delivered.
    Closed,
}

/// Receiving ends handed to the session supervisor.
pub struct WsChannels {
    /// Inbound text-frame payloads, in arrival order.
    pub receiver: mpsc::Receiver<Vec<u8>>,
    /// `Ready` at most once, then `Closed` exactly once.
    pub signal: mpsc::Receiver<ConnectionSignal>,
}

/// Wraps one client WebSocket.
pub struct WsConn {
    session_id: String,
    writer: Mutex<Option<SplitSink<WebSocket, Message>>>,
    receiver_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    signal_tx: mpsc::Sender<ConnectionSignal>,
    local_closed: AtomicBool,
    closed_signaled: AtomicBool,
}

impl WsConn {
    /// Creates the connection wrapper and the channel ends for its session.
    pub fn new(session_id: String) -> (Arc<Self>, WsChannels) {
        let (receiver_tx, receiver) = mpsc::channel(RECEIVER_BUFFER);
        // Capacity 2 fits the only possible traffic: one Ready, one Closed.
        let (signal_tx, signal) = mpsc::channel(2);

        let conn = Arc::new(Self {
            session_id,
            writer: Mutex::new(None),
            receiver_tx: Mutex::new(Some(receiver_tx)),
            signal_tx,
            local_closed: AtomicBool::new(false),
            closed_signaled: AtomicBool::new(false),
        });

        (conn, WsChannels { receiver, signal })
    }

    /// Writes one text frame to the client.
    pub async fn send(&self, payload: Vec<u8>) -> Result<(), BridgeError> {
        let text = match String::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                metrics::record_message_failure(metrics::ORIGIN_BACKEND);
                return Err(BridgeError::WebSocketWriteFailed(
                    "payload is not valid utf-8".into(),
                ));
            }
        };

        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            metrics::record_message_failure(metrics::ORIGIN_BACKEND);
            return Err(BridgeError::WebSocketWriteFailed(
                "connection not established".into(),
            ));
        };

        match sink.send(Message::Text(Utf8Bytes::from(text))).await {
            Ok(()) => {
                metrics::record_message_delivered(metrics::ORIGIN_BACKEND);
                Ok(())
            }
            Err(err) => {
                error!(session_id = %self.session_id, error = %err, "failed to write frame to client");
                metrics::record_message_failure(metrics::ORIGIN_BACKEND);
                Err(BridgeError::WebSocketWriteFailed(err.to_string()))
            }
        }
    }

    /// Closes the connection with the given close frame. The first call wins;
    /// any later call observes [`BridgeError::AlreadyClosed`].
    pub async fn close(&self, code: u16, reason: String) -> Result<(), BridgeError> {
        if self.local_closed.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyClosed);
        }

        self.signal_closed();

        let mut writer = self.writer.lock().await;
        if let Some(mut sink) = writer.take() {
            let frame = CloseFrame {
                code,
                reason: Utf8Bytes::from(reason),
            };
            if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                debug!(session_id = %self.session_id, error = %err, "close frame write failed");
            }
            let _ = sink.close().await;
        }

        info!(session_id = %self.session_id, code, "connection closed locally");
        Ok(())
    }

    /// Marks a connection whose upgrade never completed as dead, releasing
    /// the supervisor without any backend events.
    pub(crate) fn abort(&self) {
        self.local_closed.store(true, Ordering::SeqCst);
        self.signal_closed();
    }

    /// Runs the read loop on an upgraded socket until the connection ends.
    /// Exactly one `Closed` signal is emitted before the channels close, on
    /// every exit path.
    pub async fn handle(&self, socket: WebSocket) -> Result<(), BridgeError> {
        let Some(receiver_tx) = self.receiver_tx.lock().await.take() else {
            return Err(BridgeError::AlreadyClosed);
        };

        metrics::record_connect();

        let (sink, mut stream) = socket.split();
        *self.writer.lock().await = Some(sink);

        let _ = self.signal_tx.try_send(ConnectionSignal::Ready);
        info!(session_id = %self.session_id, "websocket established");

        let result = self.read_loop(&mut stream, &receiver_tx).await;

        drop(receiver_tx); // closes the inbound channel
        self.signal_closed();

        result
    }

    async fn read_loop(
        &self,
        stream: &mut SplitStream<WebSocket>,
        receiver_tx: &mpsc::Sender<Vec<u8>>,
    ) -> Result<(), BridgeError> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    debug!(session_id = %self.session_id, bytes = text.len(), "frame received");
                    if receiver_tx.send(text.as_bytes().to_vec()).await.is_err() {
                        // Supervisor is gone; the session is shutting down.
                        return self.exit_without_close_frame();
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(session_id = %self.session_id, "binary frame dropped");
                }
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map(|f| f.code).unwrap_or(1005);
                    return self.exit_with_close_frame(code);
                }
                // Ping/pong is answered by the protocol layer.
                Some(Ok(_)) => {}
                Some(Err(err)) => return self.exit_with_error(err.to_string()),
                None => return self.exit_without_close_frame(),
            }
        }
    }

    /// The client sent a close frame.
    fn exit_with_close_frame(&self, code: u16) -> Result<(), BridgeError> {
        if self.local_closed.load(Ordering::SeqCst) {
            return self.exit_backend_closed();
        }

        if NORMAL_CLOSE_CODES.contains(&code) {
            metrics::record_disconnect(metrics::ORIGIN_CLIENT);
            info!(session_id = %self.session_id, code, "client closed connection");
            return Ok(());
        }

        metrics::record_disconnect(metrics::ORIGIN_CLIENT);
        warn!(session_id = %self.session_id, code, "client closed connection with abnormal code");
        Err(BridgeError::WebSocketReadFailed(format!(
            "abnormal close code {code}"
        )))
    }

    /// The stream ended without a close frame.
    fn exit_without_close_frame(&self) -> Result<(), BridgeError> {
        if self.local_closed.load(Ordering::SeqCst) {
            return self.exit_backend_closed();
        }

        metrics::record_disconnect(metrics::ORIGIN_CLIENT);
        warn!(session_id = %self.session_id, "connection ended without close frame");
        Err(BridgeError::WebSocketReadFailed("connection reset".into()))
    }

    /// Reading failed with a protocol or transport error.
    fn exit_with_error(&self, cause: String) -> Result<(), BridgeError> {
        if self.local_closed.load(Ordering::SeqCst) {
            return self.exit_backend_closed();
        }

        metrics::record_disconnect(metrics::ORIGIN_CLIENT);
        error!(session_id = %self.session_id, error = %cause, "error while reading from client");
        Err(BridgeError::WebSocketReadFailed(cause))
    }

    fn exit_backend_closed(&self) -> Result<(), BridgeError> {
        metrics::record_disconnect(metrics::ORIGIN_BACKEND);
        info!(session_id = %self.session_id, "backend closed connection");
        Ok(())
    }

    fn signal_closed(&self) {
        if !self.closed_signaled.swap(true, Ordering::SeqCst) {
            let _ = self.signal_tx.try_send(ConnectionSignal::Closed);
        }
    }
}
