use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use ws2wh::config::Cli;
use ws2wh::lifecycle::{self, Shutdown};
use ws2wh::observability::{exporter, logging};
use ws2wh::server::BridgeServer;

/// How long in-flight sessions get to wind down after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.log_level);

    info!(
        backend_url = %config.backend_url,
        ws_listener = %config.ws_listener,
        ws_path = %config.ws_path,
        "ws2wh starting"
    );

    let shutdown = Shutdown::new();

    if config.metrics.enabled {
        let handle = exporter::install_recorder()?;
        let metrics_config = config.metrics.clone();
        let metrics_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(err) = exporter::serve(metrics_config, handle, metrics_shutdown).await {
                error!(error = %err, "metrics server stopped");
            }
        });
    }

    let server = BridgeServer::new(config).await?;
    let mut server_task = tokio::spawn(server.run(shutdown.subscribe()));

    tokio::select! {
        _ = lifecycle::wait_for_signal() => {
            shutdown.trigger();
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task).await {
                Ok(Ok(Ok(()))) => info!("server stopped"),
                Ok(Ok(Err(err))) => error!(error = %err, "server stopped with error"),
                Ok(Err(err)) => error!(error = %err, "server task failed"),
                Err(_) => warn!("grace period expired, forcing exit"),
            }
        }
        result = &mut server_task => match result {
            Ok(Ok(())) => info!("server stopped"),
            Ok(Err(err)) => error!(error = %err, "server stopped with error"),
            Err(err) => error!(error = %err, "server task failed"),
        },
    }

    info!("shutdown complete");
    Ok(())
}
