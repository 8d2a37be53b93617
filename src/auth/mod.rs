//! JWT authentication for the upgrade route.
//!
//! The token travels in a query parameter (WebSocket clients cannot set
//! headers from browsers). On success the validated claims are JSON-encoded
//! and attached to the request so the session can forward them to the
//! backend; on any failure the upgrade is rejected with `401` and no session
//! is created.

pub mod keys;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::JwtConfig;

/// JSON-encoded claims attached to an authenticated upgrade request.
#[derive(Debug, Clone)]
pub struct JwtClaims(pub String);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,

    #[error("jwt validation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("no key matches the token header")]
    NoMatchingKey,

    #[error("jwks contains no usable keys")]
    NoUsableKeys,

    #[error("failed to read jwks file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode jwks: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("jwks fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

struct VerificationKey {
    kid: Option<String>,
    algorithm: Algorithm,
    key: DecodingKey,
}

/// Validates tokens against a fixed key set resolved at startup.
pub struct JwtAuthorizer {
    query_param: String,
    issuer: Option<String>,
    audience: Option<String>,
    keys: Vec<VerificationKey>,
}

impl JwtAuthorizer {
    /// Resolves the key material and builds the authorizer. Key fetches use
    /// a 30 second timeout.
    pub async fn from_config(config: &JwtConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let jwks = config.secret_source.fetch(&client).await?;

        let mut keys = Vec::new();
        for jwk in &jwks.keys {
            let Some(algorithm) = jwk.common.key_algorithm.and_then(map_algorithm) else {
                warn!(kid = ?jwk.common.key_id, "skipping jwk with unsupported algorithm");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push(VerificationKey {
                    kid: jwk.common.key_id.clone(),
                    algorithm,
                    key,
                }),
                Err(err) => {
                    warn!(kid = ?jwk.common.key_id, error = %err, "skipping undecodable jwk");
                }
            }
        }

        if keys.is_empty() {
            return Err(AuthError::NoUsableKeys);
        }

        Ok(Self {
            query_param: config.query_param.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            keys,
        })
    }

    /// Verifies a token and returns its claims as a JSON string.
    pub fn authorize(&self, token: &str) -> Result<String, AuthError> {
        let header = decode_header(token)?;

        let mut last_error = AuthError::NoMatchingKey;
        for candidate in self.candidates(header.kid.as_deref(), header.alg) {
            let mut validation = Validation::new(candidate.algorithm);
            if let Some(issuer) = &self.issuer {
                validation.set_issuer(&[issuer]);
            }
            match &self.audience {
                Some(audience) => validation.set_audience(&[audience]),
                None => validation.validate_aud = false,
            }

            match decode::<serde_json::Value>(token, &candidate.key, &validation) {
                Ok(data) => return Ok(data.claims.to_string()),
                Err(err) => last_error = AuthError::Jwt(err),
            }
        }

        Err(last_error)
    }

    fn candidates<'a>(
        &'a self,
        kid: Option<&'a str>,
        alg: Algorithm,
    ) -> impl Iterator<Item = &'a VerificationKey> {
        self.keys.iter().filter(move |key| {
            if key.algorithm != alg {
                return false;
            }
            match (kid, &key.kid) {
                (Some(wanted), Some(have)) => wanted == have,
                // Without a kid on either side, try the key.
                _ => true,
            }
        })
    }

    fn token_from_query(&self, query: Option<&str>) -> Option<String> {
        let query = query?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == self.query_param.as_str())
            .map(|(_, value)| value.into_owned())
    }
}

fn map_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Middleware guarding the upgrade route.
pub async fn jwt_auth_middleware(
    State(authorizer): State<Arc<JwtAuthorizer>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = authorizer.token_from_query(request.uri().query());

    let Some(token) = token else {
        debug!("upgrade rejected: no token in query string");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    match authorizer.authorize(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(JwtClaims(claims));
            next.run(request).await
        }
        Err(err) => {
            debug!(error = %err, "upgrade rejected: token validation failed");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}
