//! JWKS key material sources.

use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthError;
use crate::config::JwksSource;

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

impl JwksSource {
    /// Loads the key set from the configured source.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<JwkSet, AuthError> {
        match self {
            JwksSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&content)?)
            }
            JwksSource::Url(url) => fetch_jwks(client, url).await,
            JwksSource::OpenId(issuer) => {
                let discovery_url = format!(
                    "{}/.well-known/openid-configuration",
                    issuer.trim_end_matches('/')
                );
                let config: OpenIdConfiguration = client
                    .get(&discovery_url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                info!(jwks_uri = %config.jwks_uri, "resolved jwks uri via openid discovery");
                fetch_jwks(client, &config.jwks_uri).await
            }
        }
    }
}

async fn fetch_jwks(client: &reqwest::Client, url: &str) -> Result<JwkSet, AuthError> {
    Ok(client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}
