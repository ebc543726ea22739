//! Cache-consistency layer between the store of record and the cache.
//!
//! Reads check the cache first and populate it on a miss. Writes go to the
//! store first, then refresh the item entry and drop the ranking entry. The
//! store is the only authority: store failures are errors, cache failures are
//! [`CacheFault`](crate::cache::CacheFault)s carried in the [`Outcome`].

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use metrics::histogram;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::repos::{BitcoinsRepo, RepoError};
use crate::cache::{
    CacheBackend, CacheConfig, CacheEntry, CacheError, CacheKeys, CacheOp, FaultLog,
    METRIC_CACHE_PRIME_MS, Outcome, PrimeReport, ReadSource, record_hit, record_miss,
};
use crate::domain::entities::BitcoinRecord;

#[derive(Debug, Error)]
pub enum CacheServiceError {
    #[error("store operation failed: {0}")]
    Store(#[from] RepoError),
    #[error("cache priming could not enumerate records: {0}")]
    Prime(#[source] RepoError),
}

/// Store and cache readiness, as seen by one readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub store: bool,
    pub cache: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.store && self.cache
    }
}

/// Mediates every read and write between the store and the cache.
///
/// Holds no mutable state; one instance is shared by all request tasks.
#[derive(Clone)]
pub struct CacheService {
    repo: Arc<dyn BitcoinsRepo>,
    cache: Arc<dyn CacheBackend>,
    config: CacheConfig,
    keys: CacheKeys,
}

impl CacheService {
    pub fn new(
        repo: Arc<dyn BitcoinsRepo>,
        cache: Arc<dyn CacheBackend>,
        config: CacheConfig,
    ) -> Self {
        let keys = config.keys();
        Self {
            repo,
            cache,
            config,
            keys,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Load every record into its item entry. The ranking entry is left alone.
    ///
    /// Undecodable rows and failed cache writes are skipped. Only a failure to
    /// query the store at all is returned as an error.
    pub async fn prime(&self) -> Result<PrimeReport, CacheServiceError> {
        let started_at = Instant::now();
        info!(target = "coinrank::cache", "starting cache priming");

        let mut report = PrimeReport::default();
        let mut faults = FaultLog::default();
        let mut rows = self.repo.stream_by_price_desc();

        while let Some(row) = rows.next().await {
            let record = match row {
                Ok(record) => record,
                Err(RepoError::Decode { message }) => {
                    report.scanned += 1;
                    report.skipped += 1;
                    warn!(
                        target = "coinrank::cache",
                        detail = %message,
                        "skipping undecodable row during priming"
                    );
                    continue;
                }
                Err(err) => return Err(CacheServiceError::Prime(err)),
            };

            report.scanned += 1;
            let key = self.keys.item(&record.symbol);
            if self.write_cached(&key, &record, &mut faults).await {
                report.primed += 1;
            }
        }

        report.faults = faults.into_faults();
        histogram!(METRIC_CACHE_PRIME_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        info!(
            target = "coinrank::cache",
            primed = report.primed,
            scanned = report.scanned,
            skipped = report.skipped,
            faults = report.faults.len(),
            "cache priming completed"
        );
        Ok(report)
    }

    /// Read-through fetch of one record. `None` means the store has no such symbol.
    pub async fn get_bitcoin(
        &self,
        symbol: &str,
    ) -> Result<Outcome<Option<BitcoinRecord>>, CacheServiceError> {
        let key = self.keys.item(symbol);
        let mut faults = FaultLog::default();

        if let Some(record) = self
            .read_cached::<BitcoinRecord>(&key, CacheEntry::Item, &mut faults)
            .await
        {
            return Ok(Outcome::new(Some(record), ReadSource::Cache, faults));
        }

        let found = self.repo.find_by_symbol(symbol).await?;
        if let Some(record) = found.as_ref() {
            self.write_cached(&key, record, &mut faults).await;
        }

        Ok(Outcome::new(found, ReadSource::Store, faults))
    }

    /// Write-through upsert.
    ///
    /// After success the item entry holds the new record, or has been removed
    /// when refreshing it failed; the ranking entry is always dropped.
    pub async fn set_bitcoin(
        &self,
        symbol: &str,
        price: i64,
    ) -> Result<Outcome<BitcoinRecord>, CacheServiceError> {
        let record = self.repo.upsert(symbol, price).await?;

        let mut faults = FaultLog::default();
        let key = self.keys.item(&record.symbol);
        if !self.write_cached(&key, &record, &mut faults).await {
            self.invalidate(&key, &mut faults).await;
        }
        self.invalidate(self.keys.rankings(), &mut faults).await;

        info!(
            target = "coinrank::cache",
            symbol = %record.symbol,
            price = record.price,
            "write-through completed"
        );
        Ok(Outcome::new(record, ReadSource::Store, faults))
    }

    /// Ranked listing, served from the ranking entry when present.
    pub async fn list_ranked(&self) -> Result<Outcome<Vec<BitcoinRecord>>, CacheServiceError> {
        let key = self.keys.rankings();
        let mut faults = FaultLog::default();

        if let Some(listing) = self
            .read_cached::<Vec<BitcoinRecord>>(key, CacheEntry::Rankings, &mut faults)
            .await
        {
            return Ok(Outcome::new(listing, ReadSource::Cache, faults));
        }

        let listing = self.repo.list_ranked().await?;
        self.write_cached(key, &listing, &mut faults).await;

        Ok(Outcome::new(listing, ReadSource::Store, faults))
    }

    /// Delete from the store, then drop the item and ranking entries.
    /// `None` means the store had no such symbol; the cache is not touched.
    pub async fn delete_bitcoin(
        &self,
        symbol: &str,
    ) -> Result<Outcome<Option<BitcoinRecord>>, CacheServiceError> {
        let mut faults = FaultLog::default();
        let Some(record) = self.repo.delete(symbol).await? else {
            return Ok(Outcome::new(None, ReadSource::Store, faults));
        };

        self.invalidate(&self.keys.item(&record.symbol), &mut faults)
            .await;
        self.invalidate(self.keys.rankings(), &mut faults).await;

        info!(
            target = "coinrank::cache",
            symbol = %record.symbol,
            "deleted from store and cache"
        );
        Ok(Outcome::new(Some(record), ReadSource::Store, faults))
    }

    pub async fn cache_stats(&self) -> Result<String, CacheError> {
        self.cache.stats().await
    }

    pub async fn readiness(&self) -> Readiness {
        let (store, cache) = tokio::join!(self.repo.ping(), self.cache.ping());
        if let Err(err) = &store {
            warn!(target = "coinrank::health", error = %err, "store ping failed");
        }
        if let Err(err) = &cache {
            warn!(target = "coinrank::health", error = %err, "cache ping failed");
        }
        Readiness {
            store: store.is_ok(),
            cache: cache.is_ok(),
        }
    }

    /// A read error or an undecodable value counts as a miss.
    async fn read_cached<T: DeserializeOwned>(
        &self,
        key: &str,
        entry: CacheEntry,
        faults: &mut FaultLog,
    ) -> Option<T> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(target = "coinrank::cache", key, "cache miss");
                record_miss(entry);
                return None;
            }
            Err(err) => {
                faults.record(key, CacheOp::Read, err);
                record_miss(entry);
                return None;
            }
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                debug!(target = "coinrank::cache", key, "cache hit");
                record_hit(entry);
                Some(value)
            }
            Err(err) => {
                faults.record(key, CacheOp::Decode, err);
                record_miss(entry);
                None
            }
        }
    }

    /// Returns whether the entry was written.
    async fn write_cached<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        faults: &mut FaultLog,
    ) -> bool {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                faults.record(key, CacheOp::Encode, err);
                return false;
            }
        };

        match self.cache.set(key, &bytes, self.config.ttl).await {
            Ok(()) => true,
            Err(err) => {
                faults.record(key, CacheOp::Write, err);
                false
            }
        }
    }

    async fn invalidate(&self, key: &str, faults: &mut FaultLog) {
        if let Err(err) = self.cache.delete(key).await {
            faults.record(key, CacheOp::Invalidate, err);
        }
    }
}
