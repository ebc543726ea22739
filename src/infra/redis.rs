//! Redis cache backend over a `deadpool-redis` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{
    Config as PoolConfig, Connection, Pool, PoolConfig as PoolSizing, Runtime,
    redis::{self, AsyncCommands},
};

use crate::cache::{CacheBackend, CacheError};

use super::error::InfraError;

#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool for `url`. Connections are opened lazily on first use.
    pub fn connect(url: &str, max_size: usize) -> Result<Self, InfraError> {
        let mut config = PoolConfig::from_url(url);
        config.pool = Some(PoolSizing::new(max_size));
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|err| InfraError::cache(format!("failed to create redis pool: {err}")))?;
        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool.get().await.map_err(CacheError::connection)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut connection = self.connection().await?;
        connection
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|err| CacheError::command("GET", err))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        connection
            .set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|err| CacheError::command("SET", err))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        connection
            .del::<_, ()>(key)
            .await
            .map_err(|err| CacheError::command("DEL", err))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut connection = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *connection)
            .await
            .map(|_| ())
            .map_err(|err| CacheError::command("PING", err))
    }

    async fn stats(&self) -> Result<String, CacheError> {
        let mut connection = self.connection().await?;
        redis::cmd("INFO")
            .arg("stats")
            .query_async::<String>(&mut *connection)
            .await
            .map_err(|err| CacheError::command("INFO", err))
    }
}
