//! Prometheus exposition endpoint, served on its own listener.

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::MetricsConfig;

/// Installs the global Prometheus recorder. Must happen before any metric is
/// recorded; metrics emitted earlier are lost.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Serves the scrape endpoint until the shutdown signal fires.
pub async fn serve(
    config: MetricsConfig,
    handle: PrometheusHandle,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let path = if config.path.starts_with('/') {
        config.path.clone()
    } else {
        format!("/{}", config.path)
    };

    let app = Router::new().route(
        &path,
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, path = %path, "metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("metrics server shutting down");
        })
        .await
}
