//! Static Basic-auth credentials for backend services

use std::collections::HashMap;

use aiproxy_shared::config::BackendService;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AuthError;

struct StoredCredential {
    username: [u8; 32],
    password: [u8; 32],
}

/// Service name to credential mapping, read-only after construction.
#[derive(Default)]
pub struct ServiceCredentials {
    entries: HashMap<String, StoredCredential>,
}

impl ServiceCredentials {
    pub fn from_services(services: &[BackendService]) -> Self {
        let entries = services
            .iter()
            .map(|service| {
                (
                    service.name.clone(),
                    StoredCredential {
                        username: digest(&service.username),
                        password: digest(&service.password),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, service: &str) -> bool {
        self.entries.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verify(&self, service: &str, username: &str, password: &str) -> Result<(), AuthError> {
        let stored = self
            .entries
            .get(service)
            .ok_or_else(|| AuthError::UnknownService(service.to_string()))?;

        // both halves are always compared
        let username_ok = stored.username[..].ct_eq(&digest(username)[..]);
        let password_ok = stored.password[..].ct_eq(&digest(password)[..]);
        if bool::from(username_ok & password_ok) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> ServiceCredentials {
        ServiceCredentials::from_services(&[BackendService {
            tribe: "platform".into(),
            name: "billing".into(),
            username: "billing-user".into(),
            password: "billing-pass".into(),
        }])
    }

    #[test]
    fn test_valid_credential() {
        assert!(credentials().verify("billing", "billing-user", "billing-pass").is_ok());
    }

    #[test]
    fn test_unknown_service() {
        let err = credentials()
            .verify("search", "billing-user", "billing-pass")
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownService(name) if name == "search"));
    }

    #[test]
    fn test_wrong_username_or_password() {
        let creds = credentials();
        assert!(matches!(
            creds.verify("billing", "billing-user", "billing-pas"),
            Err(AuthError::InvalidCredential)
        ));
        assert!(matches!(
            creds.verify("billing", "other", "billing-pass"),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_both_fields_wrong_is_invalid() {
        assert!(matches!(
            credentials().verify("billing", "", ""),
            Err(AuthError::InvalidCredential)
        ));
    }
}
