//! Client-facing WebSocket handling.

pub mod ws;

pub use ws::{ConnectionSignal, WsChannels, WsConn};
