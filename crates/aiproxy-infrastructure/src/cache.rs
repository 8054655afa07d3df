//! Redis cache adapter

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, Cmd};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use tracing::error;

use aiproxy_core::repositories::{CacheError, CacheStore, Expiry};
use aiproxy_shared::config::RedisSettings;

pub fn create_redis_pool(settings: &RedisSettings) -> Result<Pool, CacheError> {
    let mut config = Config::from_url(settings.url.clone());
    config.pool = Some(PoolConfig::new(settings.max_connections));
    config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::Connection(e.to_string()))
}

/// `CacheStore` over a pooled Redis connection. `KeepExisting` maps to `SET .. KEEPTTL`.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool.get().await.map_err(|e| {
            error!("Redis pool error: {}", e);
            CacheError::Connection(e.to_string())
        })
    }
}

fn set_command(key: &str, value: &str, expiry: Expiry) -> Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    match expiry {
        Expiry::Never => {}
        Expiry::KeepExisting => {
            cmd.arg("KEEPTTL");
        }
        Expiry::After(ttl) => {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
    }
    cmd
}

fn command_error(e: redis::RedisError) -> CacheError {
    error!("Redis command error: {}", e);
    CacheError::Command(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn set(&self, key: &str, value: String, expiry: Expiry) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        set_command(key, &value, expiry)
            .query_async::<()>(&mut conn)
            .await
            .map_err(command_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.connection().await?;
        // -2: missing, -1: no expiry
        let millis: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(command_error)
    }
}
