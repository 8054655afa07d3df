//! Trusted identity providers

use std::fmt;

use aiproxy_shared::AppConfig;
use serde::Serialize;

use crate::key_document::KeyDocumentFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssuerKind {
    Google,
    Microsoft,
}

impl fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerKind::Google => f.write_str("google"),
            IssuerKind::Microsoft => f.write_str("microsoft"),
        }
    }
}

/// A provider whose tokens are accepted, keyed by its exact `iss` value.
#[derive(Debug, Clone)]
pub struct Issuer {
    pub kind: IssuerKind,
    pub issuer_id: String,
    pub keys_url: String,
    pub format: KeyDocumentFormat,
    pub audience: String,
}

impl Issuer {
    pub fn google(issuer_id: impl Into<String>, keys_url: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            kind: IssuerKind::Google,
            issuer_id: issuer_id.into(),
            keys_url: keys_url.into(),
            format: KeyDocumentFormat::PemCertificateMap,
            audience: audience.into(),
        }
    }

    pub fn microsoft(issuer_id: impl Into<String>, keys_url: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            kind: IssuerKind::Microsoft,
            issuer_id: issuer_id.into(),
            keys_url: keys_url.into(),
            format: KeyDocumentFormat::Jwks,
            audience: audience.into(),
        }
    }

    /// Only the first `aud` entry is compared.
    pub fn accepts_audience(&self, audience: &[String]) -> bool {
        audience.first().is_some_and(|aud| aud == &self.audience)
    }
}

/// Allow-list of issuers. Fixed after startup.
#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    issuers: Vec<Issuer>,
}

impl IssuerRegistry {
    pub fn new(issuers: Vec<Issuer>) -> Self {
        Self { issuers }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(vec![
            Issuer::google(
                &config.google_oauth.issuer,
                &config.google_oauth.certs_url,
                &config.google_oauth.client_id,
            ),
            Issuer::microsoft(
                config.microsoft_oauth.issuer(),
                &config.microsoft_oauth.keys_url,
                &config.microsoft_oauth.client_id,
            ),
        ])
    }

    pub fn resolve(&self, iss: &str) -> Option<&Issuer> {
        self.issuers.iter().find(|issuer| issuer.issuer_id == iss)
    }
}
