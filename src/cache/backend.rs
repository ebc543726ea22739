//! Contract for the key-value cache backend.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),
    #[error("cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::Connection(err.to_string())
    }

    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Key-value store with per-entry expiry.
///
/// Expiry belongs to the backend: an expired entry must read as absent.
/// Deleting an absent key succeeds.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    /// Backend-specific diagnostic text.
    async fn stats(&self) -> Result<String, CacheError>;
}
