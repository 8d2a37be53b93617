//! ws2wh: a WebSocket-to-webhook bridge.
//!
//! Exposes a WebSocket endpoint to clients and translates each session's
//! lifecycle into HTTP webhook POSTs against a configured backend, so a
//! plain request/response backend can drive long-lived, full-duplex
//! WebSocket clients.
//!
//! ```text
//!   WS client ──▶ frontend (read loop) ──▶ session supervisor ──▶ backend webhook
//!       ▲                                        │                     │
//!       │            registry (id → session)     │     response body / │
//!       └──── reply POST {prefix}/{id} ◀─────────┴──── terminate cmd ◀─┘
//! ```
//!
//! Every client event (connect, text frame, disconnect) becomes one POST;
//! the backend answers either synchronously in the response body or later
//! via the per-session reply URL.

// Core subsystems
pub mod backend;
pub mod frontend;
pub mod server;
pub mod session;

// Cross-cutting concerns
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::Config;
pub use error::BridgeError;
pub use lifecycle::Shutdown;
pub use server::BridgeServer;
