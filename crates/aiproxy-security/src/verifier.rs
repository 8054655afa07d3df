//! Bearer token verification against trusted identity providers

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::issuer::{Issuer, IssuerKind, IssuerRegistry};
use crate::key_cache::KeyCache;
use crate::key_document::parse_key_document;
use crate::service_credentials::ServiceCredentials;

const KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity claims of a successfully verified bearer token.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: IssuerKind,
    pub issuer: String,
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub audience: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl From<Audience> for Vec<String> {
    fn from(aud: Audience) -> Self {
        match aud {
            Audience::One(aud) => vec![aud],
            Audience::Many(aud) => aud,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    iss: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    // Microsoft v2.0 tokens carry the address here when `email` is not granted
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
    #[serde(default)]
    iat: i64,
    exp: i64,
    aud: Option<Audience>,
}

#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    #[serde(default)]
    iss: String,
}

/// Verifies bearer tokens and service credentials.
///
/// Holds the only shared mutable state on the request path: the key cache.
pub struct CredentialVerifier {
    issuers: IssuerRegistry,
    keys: Arc<KeyCache>,
    services: ServiceCredentials,
    http: reqwest::Client,
}

impl CredentialVerifier {
    pub fn new(issuers: IssuerRegistry, services: ServiceCredentials) -> Self {
        Self::with_client(issuers, services, reqwest::Client::new())
    }

    pub fn with_client(
        issuers: IssuerRegistry,
        services: ServiceCredentials,
        http: reqwest::Client,
    ) -> Self {
        Self {
            issuers,
            keys: Arc::new(KeyCache::new()),
            services,
            http,
        }
    }

    pub fn key_cache(&self) -> Arc<KeyCache> {
        Arc::clone(&self.keys)
    }

    pub fn verify_service_credential(
        &self,
        service: &str,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        self.services.verify(service, username, password)
    }

    pub fn is_known_service(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub async fn verify_bearer(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        // 1. Shape and untrusted decode
        if token.split('.').count() != 3 {
            return Err(AuthError::UnsupportedCredentialFormat);
        }
        let header = decode_header(token).map_err(|_| AuthError::UnsupportedCredentialFormat)?;
        let unverified = peek_claims(token)?;

        // 2. Issuer allow-list
        let issuer = self
            .issuers
            .resolve(&unverified.iss)
            .ok_or_else(|| AuthError::UnrecognizedIssuer(unverified.iss.clone()))?;

        // 3. Asymmetric algorithms only
        if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::UnexpectedSigningMethod(format!("{:?}", header.alg)));
        }

        // 4. Key resolution
        let kid = header.kid.ok_or(AuthError::UnsupportedCredentialFormat)?;
        let key = self.resolve_key(issuer, &kid).await?;

        // 5. Signature and expiry
        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[issuer.issuer_id.as_str()]);

        let claims = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| {
                tracing::debug!(issuer = %issuer.kind, kid = %kid, error = %e, "Token rejected");
                AuthError::SignatureInvalid(e)
            })?
            .claims;

        // 6. Issuer-specific audience
        let audience: Vec<String> = claims.aud.map(Into::into).unwrap_or_default();
        if !issuer.accepts_audience(&audience) {
            return Err(AuthError::AudienceMismatch);
        }

        Ok(VerifiedIdentity {
            provider: issuer.kind,
            issuer: claims.iss,
            subject: claims.sub,
            email: claims.email.or(claims.preferred_username).unwrap_or_default(),
            name: claims.name,
            picture: claims.picture,
            issued_at: claims.iat,
            expires_at: claims.exp,
            audience,
        })
    }

    async fn resolve_key(&self, issuer: &Issuer, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.keys.get(issuer.kind, kid) {
            return Ok(key);
        }

        // Concurrent misses may each fetch; inserts are additive so the race is harmless.
        let fetched = self.fetch_keys(issuer).await?;
        let added = self.keys.insert_all(issuer.kind, fetched);
        tracing::info!(issuer = %issuer.kind, kid = %kid, added, "Refreshed signing keys");

        self.keys
            .get(issuer.kind, kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    async fn fetch_keys(&self, issuer: &Issuer) -> Result<Vec<(String, DecodingKey)>, AuthError> {
        let response = self
            .http
            .get(&issuer.keys_url)
            .timeout(KEY_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(issuer = %issuer.kind, error = %e, "Key document request failed");
                AuthError::KeyDocumentUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(issuer = %issuer.kind, status = %status, "Key document request rejected");
            return Err(AuthError::KeyDocumentUnavailable(format!(
                "{} returned {}",
                issuer.keys_url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::KeyDocumentUnavailable(e.to_string()))?;
        parse_key_document(issuer.format, &body)
    }
}

fn peek_claims(token: &str) -> Result<UnverifiedClaims, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or(AuthError::UnsupportedCredentialFormat)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::UnsupportedCredentialFormat)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::UnsupportedCredentialFormat)
}
