//! Configuration schema.

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Webhook backend URL receiving one POST per session event.
    pub backend_url: String,

    /// Address the WebSocket frontend listens on (e.g. `:3000`).
    pub ws_listener: String,

    /// Path where WebSocket connections are upgraded.
    pub ws_path: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// How the per-session reply URL is assembled.
    pub reply_channel: ReplyChannelConfig,

    /// Prometheus exposition settings.
    pub metrics: MetricsConfig,

    /// TLS termination; plain HTTP when absent.
    pub tls: Option<TlsConfig>,

    /// JWT authentication for the upgrade route; open access when absent.
    pub jwt: Option<JwtConfig>,
}

/// Components of the advertised reply channel URL:
/// `{scheme}://{hostname}:{port}{path_prefix}/{session_id}`.
#[derive(Debug, Clone)]
pub struct ReplyChannelConfig {
    /// Path prefix of the reply endpoint (default `/reply`).
    pub path_prefix: String,
    /// Hostname the backend can reach the bridge at.
    pub hostname: String,
    /// `http`, or `https` when TLS is configured.
    pub scheme: String,
    /// Port the frontend listener is bound to.
    pub port: String,
}

impl ReplyChannelConfig {
    /// Base reply URL without the session id segment.
    pub fn reply_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.hostname,
            self.port,
            self.path_prefix.trim_end_matches('/')
        )
    }
}

/// Prometheus exposition settings.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

/// TLS key pair for the frontend listener.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Certificate chain file (PEM).
    pub cert_path: String,
    /// Private key file (PEM).
    pub key_path: String,
}

/// JWT authentication settings for the upgrade route.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Query parameter carrying the token (default `token`).
    pub query_param: String,
    /// Expected `iss` claim, when set.
    pub issuer: Option<String>,
    /// Expected `aud` claim, when set.
    pub audience: Option<String>,
    /// Where the verification keys come from.
    pub secret_source: JwksSource,
}

/// Key material source for JWT verification.
#[derive(Debug, Clone)]
pub enum JwksSource {
    /// JWKS document on disk.
    File(String),
    /// JWKS document fetched over HTTP.
    Url(String),
    /// OpenID Connect discovery: `{issuer}/.well-known/openid-configuration`.
    OpenId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_url_joins_components() {
        let config = ReplyChannelConfig {
            path_prefix: "/reply".into(),
            hostname: "bridge.example.com".into(),
            scheme: "https".into(),
            port: "3000".into(),
        };
        assert_eq!(config.reply_url(), "https://bridge.example.com:3000/reply");
    }

    #[test]
    fn reply_url_trims_trailing_slash() {
        let config = ReplyChannelConfig {
            path_prefix: "/reply/".into(),
            hostname: "localhost".into(),
            scheme: "http".into(),
            port: "8080".into(),
        };
        assert_eq!(config.reply_url(), "http://localhost:8080/reply");
    }
}
