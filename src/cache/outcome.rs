//! Results of cache-mediated operations.
//!
//! Cache failures after the store has answered are side effects: they are
//! logged, counted, and returned as [`CacheFault`]s alongside the value. They
//! never become the operation's error.

use std::fmt;

use metrics::counter;
use tracing::warn;

use super::keys::CacheEntry;

pub const METRIC_CACHE_HIT_TOTAL: &str = "coinrank_cache_hit_total";
pub const METRIC_CACHE_MISS_TOTAL: &str = "coinrank_cache_miss_total";
pub const METRIC_CACHE_FAULT_TOTAL: &str = "coinrank_cache_fault_total";
pub const METRIC_CACHE_PRIME_MS: &str = "coinrank_cache_prime_ms";

/// Which cache interaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    /// The backend could not be read.
    Read,
    /// A cached value could not be deserialized.
    Decode,
    /// A value could not be serialized for caching.
    Encode,
    /// Populating an entry failed.
    Write,
    /// Removing an entry failed.
    Invalidate,
}

impl CacheOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::Read => "read",
            CacheOp::Decode => "decode",
            CacheOp::Encode => "encode",
            CacheOp::Write => "write",
            CacheOp::Invalidate => "invalidate",
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFault {
    pub key: String,
    pub op: CacheOp,
    pub detail: String,
}

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Store,
}

impl ReadSource {
    /// Value of the `x-cache` response header.
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ReadSource::Cache => "HIT",
            ReadSource::Store => "MISS",
        }
    }
}

/// Primary result of an operation plus any non-fatal cache faults.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub source: ReadSource,
    pub faults: Vec<CacheFault>,
}

impl<T> Outcome<T> {
    pub(crate) fn new(value: T, source: ReadSource, faults: FaultLog) -> Self {
        Self {
            value,
            source,
            faults: faults.into_faults(),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// True when every cache side effect succeeded.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn has_fault(&self, op: CacheOp) -> bool {
        self.faults.iter().any(|fault| fault.op == op)
    }
}

/// Summary of a priming pass.
#[derive(Debug, Clone, Default)]
pub struct PrimeReport {
    /// Rows read from the store, including rows that failed to decode.
    pub scanned: usize,
    /// Rows that failed to decode and were not cached.
    pub skipped: usize,
    /// Item entries written to the cache.
    pub primed: usize,
    pub faults: Vec<CacheFault>,
}

/// Collects faults for one operation, logging and counting each as it lands.
#[derive(Debug, Default)]
pub(crate) struct FaultLog {
    faults: Vec<CacheFault>,
}

impl FaultLog {
    pub(crate) fn record(&mut self, key: &str, op: CacheOp, detail: impl fmt::Display) {
        let detail = detail.to_string();
        warn!(
            target = "coinrank::cache",
            key,
            op = op.as_str(),
            detail = %detail,
            "cache side effect failed"
        );
        counter!(METRIC_CACHE_FAULT_TOTAL, "op" => op.as_str()).increment(1);
        self.faults.push(CacheFault {
            key: key.to_string(),
            op,
            detail,
        });
    }

    pub(crate) fn into_faults(self) -> Vec<CacheFault> {
        self.faults
    }
}

pub(crate) fn record_hit(entry: CacheEntry) {
    counter!(METRIC_CACHE_HIT_TOTAL, "entry" => entry.as_str()).increment(1);
}

pub(crate) fn record_miss(entry: CacheEntry) {
    counter!(METRIC_CACHE_MISS_TOTAL, "entry" => entry.as_str()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_log_preserves_order_and_detail() {
        let mut log = FaultLog::default();
        log.record("bitcoin:BTC", CacheOp::Write, "connection reset");
        log.record("bitcoin:rankings", CacheOp::Invalidate, "timeout");

        let outcome = Outcome::new((), ReadSource::Store, log);
        assert!(!outcome.is_clean());
        assert!(outcome.has_fault(CacheOp::Invalidate));
        assert!(!outcome.has_fault(CacheOp::Decode));
        assert_eq!(outcome.faults[0].key, "bitcoin:BTC");
        assert_eq!(outcome.faults[0].detail, "connection reset");
    }
}
