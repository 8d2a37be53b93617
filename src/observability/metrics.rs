//! Metric directory: every counter and gauge the bridge emits, with stable
//! names and label values.
//!
//! The `origin` label reads from the event's point of view: `client` labels
//! what the client did (messages forwarded to the backend, client-initiated
//! disconnects), `backend` labels the dual (messages written to the client,
//! backend-initiated disconnects).

use metrics::{counter, gauge};

pub const ORIGIN_CLIENT: &str = "client";
pub const ORIGIN_BACKEND: &str = "backend";

/// A WebSocket handshake completed.
pub fn record_connect() {
    counter!("ws2wh_connects_total").increment(1);
}

/// A connection ended; `origin` says which side closed it.
pub fn record_disconnect(origin: &'static str) {
    counter!("ws2wh_disconnects_total", "origin" => origin).increment(1);
}

/// A message crossed the bridge successfully.
pub fn record_message_delivered(origin: &'static str) {
    counter!("ws2wh_message_delivered_total", "origin" => origin).increment(1);
}

/// A message failed to cross the bridge.
pub fn record_message_failure(origin: &'static str) {
    counter!("ws2wh_message_failure_total", "origin" => origin).increment(1);
}

/// Mirrors the registry size; callers update it under the registry lock.
pub fn set_active_sessions(count: usize) {
    gauge!("ws2wh_active_sessions").set(count as f64);
}
