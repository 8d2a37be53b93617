//! Webhook backend integration: event types, close-directive validation and
//! the HTTP client that delivers session events as webhook POSTs.

pub mod client;
pub mod close;
pub mod event;

pub use client::{Backend, SessionHandle, WebhookBackend};
pub use event::{BackendMessage, WsEvent};
