//! Process-local cache backend.
//!
//! Entries expire lazily: an expired entry reads as absent and is dropped on
//! the next access. Uses `tokio::time::Instant` so paused test clocks apply.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use super::backend::{CacheBackend, CacheError};

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single insert or remove, so a poisoned map is still consistent.
    fn entries(&self, op: &'static str) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            poisoned_lock(op, "read");
            PoisonError::into_inner(poisoned)
        })
    }

    fn entries_mut(&self, op: &'static str) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            poisoned_lock(op, "write");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries("len")
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists for `key`, without touching hit counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries("contains")
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Overwrite `key` with raw bytes, bypassing serialization.
    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>, ttl: Duration) {
        self.entries_mut("insert_raw").insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

fn poisoned_lock(op: &'static str, access: &'static str) {
    warn!(
        target = "coinrank::cache::memory",
        op,
        access,
        "memory cache lock was poisoned; continuing with its contents"
    );
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let found = {
            let entries = self.entries("get");
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => Some(Some(entry.value.clone())),
                Some(_) => Some(None),
                None => None,
            }
        };

        match found {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some(None) => {
                self.entries_mut("get.expire").remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.insert_raw(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries_mut("delete").remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn stats(&self) -> Result<String, CacheError> {
        Ok(format!(
            "# Stats\r\nbackend:memory\r\nkeys:{}\r\nkeyspace_hits:{}\r\nkeyspace_misses:{}\r\n",
            self.len(),
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        ))
    }
}
