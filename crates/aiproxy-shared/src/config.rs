//! Configuration management

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use validator::Validate;

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_AUDIT_WORKERS, DEFAULT_COMPLETION_TIMEOUT_SECS, DEFAULT_ENV,
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TURN_DEADLINE_SECS, GOOGLE_CERTS_URL, GOOGLE_ISSUER,
    MICROSOFT_ISSUER_TEMPLATE, MICROSOFT_KEYS_URL,
};
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub app: AppSettings,
    pub log: LogSettings,
    #[validate(nested)]
    pub redis: RedisSettings,
    #[validate(nested)]
    pub database: DatabaseSettings,
    #[validate(nested)]
    pub openai: OpenAiSettings,
    #[validate(nested)]
    pub google_oauth: GoogleOauthSettings,
    #[validate(nested)]
    pub microsoft_oauth: MicrosoftOauthSettings,
    #[validate(nested)]
    pub engine: EngineSettings,
    #[serde(default)]
    #[validate(nested)]
    pub services: Vec<BackendService>,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppSettings {
    pub env: String,
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct RedisSettings {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(range(min = 1))]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct DatabaseSettings {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(range(min = 1))]
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct OpenAiSettings {
    #[validate(url)]
    pub url: String,
    pub api_key: String,
    pub model: Option<String>,
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    #[validate(range(min = 1))]
    pub token_limit: u64,
    /// Quota window length, applied on the first budget write of a window.
    #[validate(range(min = 1))]
    pub token_lifetime_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct GoogleOauthSettings {
    #[validate(length(min = 1))]
    pub client_id: String,
    pub issuer: String,
    #[validate(url)]
    pub certs_url: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct MicrosoftOauthSettings {
    #[validate(length(min = 1))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(url)]
    pub keys_url: String,
}

impl MicrosoftOauthSettings {
    /// The `iss` value Microsoft stamps on v2.0 tokens for this tenant.
    pub fn issuer(&self) -> String {
        MICROSOFT_ISSUER_TEMPLATE.replace("{tenant}", &self.tenant_id)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EngineSettings {
    #[validate(range(min = 1))]
    pub turn_deadline_secs: u64,
    #[validate(range(min = 1, max = 64))]
    pub audit_workers: usize,
    pub cache_backend: CacheBackend,
    pub store_backend: StoreBackend,
}

/// Static Basic-auth credential for a backend-to-backend caller.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct BackendService {
    #[serde(default)]
    pub tribe: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.into());
        let config = Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("AIPROXY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::finish(config)
    }

    /// Builds a configuration from an in-memory TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        let config = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, AppError> {
        Ok(Config::builder()
            .set_default("app.env", DEFAULT_ENV)?
            .set_default("app.host", DEFAULT_HOST)?
            .set_default("app.port", DEFAULT_PORT)?
            .set_default("app.name", DEFAULT_APP_NAME)?
            .set_default("log.level", "info")?
            .set_default("log.format", "json")?
            .set_default("redis.url", "redis://127.0.0.1:6379/0")?
            .set_default("redis.max_connections", 16)?
            .set_default("database.url", "postgres://localhost/aiproxy")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("openai.timeout_secs", DEFAULT_COMPLETION_TIMEOUT_SECS)?
            .set_default("google_oauth.issuer", GOOGLE_ISSUER)?
            .set_default("google_oauth.certs_url", GOOGLE_CERTS_URL)?
            .set_default("microsoft_oauth.keys_url", MICROSOFT_KEYS_URL)?
            .set_default("engine.turn_deadline_secs", DEFAULT_TURN_DEADLINE_SECS)?
            .set_default("engine.audit_workers", DEFAULT_AUDIT_WORKERS as u64)?
            .set_default("engine.cache_backend", "redis")?
            .set_default("engine.store_backend", "postgres")?)
    }

    fn finish(config: Config) -> Result<Self, AppError> {
        let settings: AppConfig = config.try_deserialize()?;
        settings.validate()?;
        if settings.openai.timeout_secs >= settings.engine.turn_deadline_secs {
            return Err(AppError::ConfigError(ConfigError::Message(format!(
                "openai.timeout_secs ({}) must be below engine.turn_deadline_secs ({})",
                settings.openai.timeout_secs, settings.engine.turn_deadline_secs
            ))));
        }
        Ok(settings)
    }
}
