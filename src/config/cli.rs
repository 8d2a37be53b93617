//! CLI flags with environment fallbacks, validated into [`Config`].

use clap::Parser;
use thiserror::Error;
use url::Url;

use crate::config::schema::{
    Config, JwksSource, JwtConfig, MetricsConfig, ReplyChannelConfig, TlsConfig,
};

/// WebSocket-to-webhook bridge.
#[derive(Debug, Parser)]
#[command(name = "ws2wh", version, about)]
pub struct Cli {
    /// Webhook backend URL (must accept POST)
    #[arg(short = 'b', long, env = "BACKEND_URL")]
    pub backend_url: String,

    /// Backend reply path prefix
    #[arg(short = 'r', long, env = "REPLY_PATH_PREFIX", default_value = "/reply")]
    pub reply_path_prefix: String,

    /// WebSocket frontend listener address; defaults to `:{ws-port}`
    #[arg(short = 'l', long, env = "WS_LISTENER")]
    pub ws_listener: Option<String>,

    /// WebSocket frontend listener port
    #[arg(long, env = "WS_PORT", default_value_t = 3000)]
    pub ws_port: u16,

    /// WebSocket upgrade path
    #[arg(short = 'p', long, env = "WS_PATH", default_value = "/")]
    pub ws_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Hostname advertised in the reply channel URL; falls back to HOSTNAME
    #[arg(long, env = "REPLY_HOSTNAME")]
    pub reply_hostname: Option<String>,

    /// Enable Prometheus metrics
    #[arg(long, env = "METRICS_ENABLED")]
    pub metrics_enabled: bool,

    /// Prometheus metrics port
    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Prometheus metrics path
    #[arg(long, env = "METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// TLS certificate path (PEM). Required if the key path is set
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// TLS private key path (PEM). Required if the certificate path is set
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    /// Enable JWT authentication on the upgrade route
    #[arg(long, env = "JWT_ENABLED")]
    pub jwt_enabled: bool,

    /// Expected JWT issuer
    #[arg(long, env = "JWT_ISSUER")]
    pub jwt_issuer: Option<String>,

    /// Expected JWT audience
    #[arg(long, env = "JWT_AUDIENCE")]
    pub jwt_audience: Option<String>,

    /// JWT secret type (jwks-file, jwks-url, openid)
    #[arg(long, env = "JWT_SECRET_TYPE", default_value = "jwks-url")]
    pub jwt_secret_type: String,

    /// Path to the JWT secret (file path or URL depending on the type)
    #[arg(long, env = "JWT_SECRET_PATH")]
    pub jwt_secret_path: Option<String>,

    /// Query parameter carrying the JWT token
    #[arg(long, env = "JWT_QUERY_PARAM", default_value = "token")]
    pub jwt_query_param: String,
}

/// Configuration errors that are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid backend URL {url:?}: {cause}")]
    InvalidBackendUrl {
        url: String,
        #[source]
        cause: url::ParseError,
    },

    #[error("TLS certificate and key paths must be set together")]
    IncompleteTlsKeyPair,

    #[error("JWT authentication enabled but no secret path configured")]
    MissingJwtSecretPath,

    #[error("unknown JWT secret type {0:?} (expected jwks-file, jwks-url or openid)")]
    UnknownJwtSecretType(String),
}

impl Cli {
    /// Validates the flags and assembles the runtime configuration.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        Url::parse(&self.backend_url).map_err(|cause| ConfigError::InvalidBackendUrl {
            url: self.backend_url.clone(),
            cause,
        })?;

        let tls = match (self.tls_cert_path, self.tls_key_path) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig { cert_path, key_path }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTlsKeyPair),
        };

        let scheme = if tls.is_some() { "https" } else { "http" };

        let ws_listener = self
            .ws_listener
            .unwrap_or_else(|| format!(":{}", self.ws_port));

        let hostname = self
            .reply_hostname
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "localhost".to_string());

        let jwt = if self.jwt_enabled {
            let secret_path = self
                .jwt_secret_path
                .ok_or(ConfigError::MissingJwtSecretPath)?;
            let secret_source = match self.jwt_secret_type.as_str() {
                "jwks-file" => JwksSource::File(secret_path),
                "jwks-url" => JwksSource::Url(secret_path),
                "openid" => JwksSource::OpenId(secret_path),
                other => return Err(ConfigError::UnknownJwtSecretType(other.to_string())),
            };
            Some(JwtConfig {
                query_param: self.jwt_query_param,
                issuer: self.jwt_issuer,
                audience: self.jwt_audience,
                secret_source,
            })
        } else {
            None
        };

        Ok(Config {
            backend_url: self.backend_url,
            ws_path: self.ws_path,
            log_level: self.log_level,
            reply_channel: ReplyChannelConfig {
                path_prefix: self.reply_path_prefix,
                hostname,
                scheme: scheme.to_string(),
                port: listener_port(&ws_listener),
            },
            ws_listener,
            metrics: MetricsConfig {
                enabled: self.metrics_enabled,
                port: self.metrics_port,
                path: self.metrics_path,
            },
            tls,
            jwt,
        })
    }
}

/// Extracts the port from a listener address like `:3000` or `0.0.0.0:8080`.
fn listener_port(listener: &str) -> String {
    if let Some(port) = listener.strip_prefix(':') {
        return port.to_string();
    }
    if let Some((_, port)) = listener.rsplit_once(':') {
        return port.to_string();
    }
    "3000".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from([&["ws2wh"], args].concat()).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = parse(&["-b", "http://localhost:3001/wh"])
            .into_config()
            .unwrap();

        assert_eq!(config.backend_url, "http://localhost:3001/wh");
        assert_eq!(config.ws_listener, ":3000");
        assert_eq!(config.ws_path, "/");
        assert_eq!(config.reply_channel.path_prefix, "/reply");
        assert_eq!(config.reply_channel.scheme, "http");
        assert_eq!(config.reply_channel.port, "3000");
        assert!(!config.metrics.enabled);
        assert!(config.tls.is_none());
        assert!(config.jwt.is_none());
    }

    #[test]
    fn rejects_invalid_backend_url() {
        let err = parse(&["-b", "not a url"]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackendUrl { .. }));
    }

    #[test]
    fn rejects_incomplete_tls_pair() {
        let err = parse(&["-b", "http://localhost:3001", "--tls-cert-path", "/tmp/cert.pem"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteTlsKeyPair));
    }

    #[test]
    fn tls_switches_reply_scheme_to_https() {
        let config = parse(&[
            "-b",
            "http://localhost:3001",
            "--tls-cert-path",
            "/tmp/cert.pem",
            "--tls-key-path",
            "/tmp/key.pem",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.reply_channel.scheme, "https");
        assert!(config.tls.is_some());
    }

    #[test]
    fn derives_reply_port_from_listener() {
        let config = parse(&["-b", "http://localhost:3001", "-l", "0.0.0.0:8080"])
            .into_config()
            .unwrap();
        assert_eq!(config.reply_channel.port, "8080");
    }

    #[test]
    fn jwt_requires_secret_path() {
        let err = parse(&["-b", "http://localhost:3001", "--jwt-enabled"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingJwtSecretPath));
    }

    #[test]
    fn jwt_rejects_unknown_secret_type() {
        let err = parse(&[
            "-b",
            "http://localhost:3001",
            "--jwt-enabled",
            "--jwt-secret-type",
            "carrier-pigeon",
            "--jwt-secret-path",
            "/tmp/jwks.json",
        ])
        .into_config()
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownJwtSecretType(_)));
    }

    #[test]
    fn listener_port_variants() {
        assert_eq!(listener_port(":3000"), "3000");
        assert_eq!(listener_port("0.0.0.0:8080"), "8080");
        assert_eq!(listener_port("localhost"), "3000");
    }
}
