//! Cross-cutting observability: structured logging, metric recording and the
//! Prometheus exposition endpoint.

pub mod exporter;
pub mod logging;
pub mod metrics;
