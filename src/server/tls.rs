//! TLS termination for the frontend listener.
//!
//! Certificates and keys are loaded from PEM files at startup. rustls only
//! speaks TLS 1.2 and 1.3, which is exactly the floor the bridge requires.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::config::TlsConfig;
use crate::server::ServeError;

/// Accepts TLS connections and serves the router on each until shutdown.
/// In-flight connections are left to finish on their own; the process-level
/// grace period bounds how long that takes.
pub async fn serve(
    listener: TcpListener,
    tls_config: &TlsConfig,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ServeError> {
    let server_config = load_server_config(tls_config)?;
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!("tls listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let service = TowerToHyperService::new(app.clone());

                tokio::spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(stream) => stream,
                        Err(err) => {
                            debug!(peer = %peer, error = %err, "tls handshake failed");
                            return;
                        }
                    };

                    if let Err(err) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
                        .await
                    {
                        debug!(peer = %peer, error = %err, "connection error");
                    }
                });
            }
        }
    }
}

fn load_server_config(tls_config: &TlsConfig) -> Result<rustls::ServerConfig, ServeError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(&tls_config.cert_path)?))
        .collect::<Result<Vec<_>, _>>()?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(&tls_config.key_path)?))?
        .ok_or(ServeError::NoPrivateKey)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}
