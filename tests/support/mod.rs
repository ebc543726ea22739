#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coinrank::application::cache_service::CacheService;
use coinrank::application::repos::{BitcoinsRepo, RepoError};
use coinrank::cache::{CacheBackend, CacheConfig, CacheError, MemoryBackend};
use coinrank::domain::entities::BitcoinRecord;
use coinrank::domain::ranking::{assign_row_ranks, ranking_order};
use futures::stream::{self, BoxStream, StreamExt};
use time::OffsetDateTime;

/// Store double with the same upsert and ranking semantics as the Postgres
/// repository.
#[derive(Default)]
pub struct InMemoryRepo {
    rows: Mutex<BTreeMap<String, BitcoinRecord>>,
    undecodable: Mutex<HashSet<String>>,
    failing: AtomicBool,
    ranked_queries: AtomicUsize,
    lookups: AtomicUsize,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the stored row for `symbol` fail to decode while streaming.
    pub fn mark_undecodable(&self, symbol: &str) {
        self.undecodable
            .lock()
            .expect("undecodable lock")
            .insert(symbol.to_string());
    }

    pub fn row(&self, symbol: &str) -> Option<BitcoinRecord> {
        self.rows.lock().expect("rows lock").get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("rows lock").len()
    }

    pub fn ranked_queries(&self) -> usize {
        self.ranked_queries.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepoError::from_persistence("connection refused"))
        } else {
            Ok(())
        }
    }

    fn sorted(&self) -> Vec<BitcoinRecord> {
        let mut rows: Vec<BitcoinRecord> = self
            .rows
            .lock()
            .expect("rows lock")
            .values()
            .cloned()
            .collect();
        rows.sort_by(ranking_order);
        rows
    }
}

#[async_trait]
impl BitcoinsRepo for InMemoryRepo {
    fn stream_by_price_desc(&self) -> BoxStream<'_, Result<BitcoinRecord, RepoError>> {
        if let Err(err) = self.check() {
            return stream::once(async move { Err(err) }).boxed();
        }

        let undecodable = self.undecodable.lock().expect("undecodable lock").clone();
        let rows: Vec<Result<BitcoinRecord, RepoError>> = self
            .sorted()
            .into_iter()
            .map(|record| {
                if undecodable.contains(&record.symbol) {
                    Err(RepoError::Decode {
                        message: format!("column `price` of `{}`", record.symbol),
                    })
                } else {
                    Ok(record)
                }
            })
            .collect();
        stream::iter(rows).boxed()
    }

    async fn list_ranked(&self) -> Result<Vec<BitcoinRecord>, RepoError> {
        self.check()?;
        self.ranked_queries.fetch_add(1, Ordering::SeqCst);
        Ok(assign_row_ranks(self.sorted()))
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.row(symbol))
    }

    async fn upsert(&self, symbol: &str, price: i64) -> Result<BitcoinRecord, RepoError> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let mut rows = self.rows.lock().expect("rows lock");
        let record = match rows.get(symbol) {
            Some(existing) => BitcoinRecord {
                price,
                updated_at: now.max(existing.updated_at),
                ..existing.clone()
            },
            None => BitcoinRecord {
                symbol: symbol.to_string(),
                price,
                rank: None,
                created_at: now,
                updated_at: now,
            },
        };
        rows.insert(symbol.to_string(), record.clone());
        Ok(record)
    }

    async fn delete(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError> {
        self.check()?;
        Ok(self.rows.lock().expect("rows lock").remove(symbol))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.check()
    }
}

/// Memory cache whose operations can be made to fail one kind at a time.
#[derive(Default)]
pub struct FlakyCache {
    pub inner: MemoryBackend,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    sets: AtomicUsize,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, failing: bool) {
        self.fail_get.store(failing, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, failing: bool) {
        self.fail_set.store(failing, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, failing: bool) {
        self.fail_delete.store(failing, Ordering::SeqCst);
    }

    pub fn fail_all(&self, failing: bool) {
        self.fail_reads(failing);
        self.fail_writes(failing);
        self.fail_deletes(failing);
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::connection("connection reset by peer"));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(CacheError::command("SET", "OOM command not allowed"));
        }
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(CacheError::command("DEL", "READONLY replica"));
        }
        self.inner.delete(key).await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::connection("connection reset by peer"));
        }
        self.inner.ping().await
    }

    async fn stats(&self) -> Result<String, CacheError> {
        self.inner.stats().await
    }
}

pub struct Harness {
    pub repo: Arc<InMemoryRepo>,
    pub cache: Arc<FlakyCache>,
    pub service: CacheService,
}

pub fn harness() -> Harness {
    let repo = Arc::new(InMemoryRepo::new());
    let cache = Arc::new(FlakyCache::new());
    let service = CacheService::new(repo.clone(), cache.clone(), CacheConfig::default());
    Harness {
        repo,
        cache,
        service,
    }
}
