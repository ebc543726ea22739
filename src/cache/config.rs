//! Cache configuration.

use std::time::Duration;

use super::keys::CacheKeys;

const DEFAULT_TTL_SECS: u64 = 60 * 60;
pub(crate) const DEFAULT_KEY_PREFIX: &str = "bitcoin:";

/// Immutable cache settings shared by every request.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of every entry written by the service.
    pub ttl: Duration,
    /// Prefix of item keys; the ranking listing lives at `<prefix>rankings`.
    pub key_prefix: String,
    /// Load every record into the cache before serving.
    pub prime_on_startup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            prime_on_startup: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self::new(settings.ttl, settings.key_prefix.clone(), settings.prime_on_startup)
    }
}

impl CacheConfig {
    /// TTL is raised to one second: Redis rejects `SET ... EX 0`.
    pub fn new(ttl: Duration, key_prefix: String, prime_on_startup: bool) -> Self {
        Self {
            ttl: ttl.max(Duration::from_secs(1)),
            key_prefix,
            prime_on_startup,
        }
    }

    pub fn keys(&self) -> CacheKeys {
        CacheKeys::new(self.key_prefix.clone())
    }
}
