//! Application-wide constants

pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_APP_NAME: &str = "aiproxy-server";

pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";
pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";
pub const MICROSOFT_ISSUER_TEMPLATE: &str = "https://login.microsoftonline.com/{tenant}/v2.0";
pub const MICROSOFT_KEYS_URL: &str = "https://login.microsoftonline.com/common/discovery/keys";

/// Upper bound for one user turn, including a chained summarization call.
pub const DEFAULT_TURN_DEADLINE_SECS: u64 = 60;
/// Per-request HTTP timeout; stays below the turn deadline.
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_AUDIT_WORKERS: usize = 2;
