use serde::Serialize;

/// Read-only view of a user's quota window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub token_limit: u64,
    pub token_usage: u64,
    /// Set once more than half the limit is spent.
    pub warning: bool,
}

impl TokenUsage {
    pub fn new(token_limit: u64, token_usage: u64) -> Self {
        Self {
            token_limit,
            token_usage,
            warning: token_usage > token_limit / 2,
        }
    }
}
