use std::sync::Arc;

use aiproxy_core::ConversationEngine;
use aiproxy_security::CredentialVerifier;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<CredentialVerifier>,
    pub engine: Arc<ConversationEngine>,
}

impl AppState {
    pub fn new(verifier: Arc<CredentialVerifier>, engine: Arc<ConversationEngine>) -> Self {
        Self { verifier, engine }
    }
}
