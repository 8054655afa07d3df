//! Parsing of published signing-key documents

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use thiserror::Error;
use x509_parser::prelude::{parse_x509_certificate, X509Certificate};
use x509_parser::public_key::PublicKey;

use crate::error::AuthError;

/// Shape of the document served at an issuer's keys URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDocumentFormat {
    /// `{"<kid>": "-----BEGIN CERTIFICATE-----..."}`
    PemCertificateMap,
    /// `{"keys": [{"kid": .., "x5c": [..], ..}]}`
    Jwks,
}

#[derive(Error, Debug)]
enum KeyParseError {
    #[error("invalid PEM block")]
    Pem,
    #[error("invalid base64 certificate: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid certificate: {0}")]
    Certificate(String),
    #[error("unsupported key type")]
    UnsupportedKeyType,
    #[error("invalid key components: {0}")]
    Components(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Deserialize)]
struct Jwks {
    #[serde(default)]
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default)]
    kty: String,
    #[serde(rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    x5c: Vec<String>,
    n: Option<String>,
    e: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

/// Parses every usable key in `body`. Keys that fail to parse are skipped.
pub fn parse_key_document(
    format: KeyDocumentFormat,
    body: &[u8],
) -> Result<Vec<(String, DecodingKey)>, AuthError> {
    match format {
        KeyDocumentFormat::PemCertificateMap => parse_pem_map(body),
        KeyDocumentFormat::Jwks => parse_jwks(body),
    }
}

fn parse_pem_map(body: &[u8]) -> Result<Vec<(String, DecodingKey)>, AuthError> {
    let certs: HashMap<String, String> = serde_json::from_slice(body)
        .map_err(|e| AuthError::KeyDocumentUnavailable(format!("malformed certificate map: {}", e)))?;

    let mut keys = Vec::with_capacity(certs.len());
    for (kid, pem) in certs {
        match key_from_pem(pem.as_bytes()) {
            Ok(key) => keys.push((kid, key)),
            Err(e) => tracing::warn!(kid = %kid, error = %e, "Skipping unparseable certificate"),
        }
    }
    Ok(keys)
}

fn parse_jwks(body: &[u8]) -> Result<Vec<(String, DecodingKey)>, AuthError> {
    let jwks: Jwks = serde_json::from_slice(body)
        .map_err(|e| AuthError::KeyDocumentUnavailable(format!("malformed JWKS: {}", e)))?;

    let mut keys = Vec::with_capacity(jwks.keys.len());
    for jwk in jwks.keys {
        let Some(kid) = jwk.kid.clone() else {
            continue;
        };
        if jwk.key_use.as_deref() == Some("enc") {
            continue;
        }
        match key_from_jwk(&jwk) {
            Ok(key) => keys.push((kid, key)),
            Err(e) => tracing::warn!(kid = %kid, error = %e, "Skipping unparseable JWK"),
        }
    }
    Ok(keys)
}

fn key_from_jwk(jwk: &Jwk) -> Result<DecodingKey, KeyParseError> {
    if let Some(cert) = jwk.x5c.first() {
        let der = STANDARD.decode(cert.trim())?;
        return key_from_der(&der);
    }

    match (jwk.kty.as_str(), &jwk.n, &jwk.e, &jwk.x, &jwk.y) {
        ("RSA", Some(n), Some(e), _, _) => Ok(DecodingKey::from_rsa_components(n, e)?),
        ("EC", _, _, Some(x), Some(y)) => Ok(DecodingKey::from_ec_components(x, y)?),
        _ => Err(KeyParseError::UnsupportedKeyType),
    }
}

fn key_from_pem(pem: &[u8]) -> Result<DecodingKey, KeyParseError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem).map_err(|_| KeyParseError::Pem)?;
    if pem.label != "CERTIFICATE" {
        return Err(KeyParseError::Pem);
    }
    key_from_der(&pem.contents)
}

fn key_from_der(der: &[u8]) -> Result<DecodingKey, KeyParseError> {
    let (_, cert) =
        parse_x509_certificate(der).map_err(|e| KeyParseError::Certificate(e.to_string()))?;
    key_from_certificate(&cert)
}

fn key_from_certificate(cert: &X509Certificate<'_>) -> Result<DecodingKey, KeyParseError> {
    let spki = cert.public_key();
    let parsed = spki
        .parsed()
        .map_err(|e| KeyParseError::Certificate(e.to_string()))?;

    match parsed {
        // PKCS#1 RSAPublicKey
        PublicKey::RSA(_) => {
            let der: &[u8] = &spki.subject_public_key.data;
            Ok(DecodingKey::from_rsa_der(der))
        }
        // SEC1 uncompressed point
        PublicKey::EC(point) => Ok(DecodingKey::from_ec_der(point.data())),
        _ => Err(KeyParseError::UnsupportedKeyType),
    }
}
