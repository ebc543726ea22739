//! Cache layer primitives.
//!
//! The cache is a redundant, time-bounded copy of the store of record. This
//! module defines the backend contract (`get` / `set` with TTL / `delete`),
//! the key space, configuration, and the fault types that carry cache
//! failures next to, never instead of, an operation's primary result.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! ttl_seconds = 3600
//! key_prefix = "bitcoin:"
//! prime_on_startup = true
//! ```

mod backend;
mod config;
mod keys;
mod memory;
mod outcome;

pub use backend::{CacheBackend, CacheError};
pub use config::CacheConfig;
pub(crate) use config::DEFAULT_KEY_PREFIX;
pub use keys::{CacheEntry, CacheKeys};
pub use memory::MemoryBackend;
pub use outcome::{
    CacheFault, CacheOp, METRIC_CACHE_FAULT_TOTAL, METRIC_CACHE_HIT_TOTAL,
    METRIC_CACHE_MISS_TOTAL, METRIC_CACHE_PRIME_MS, Outcome, PrimeReport, ReadSource,
};

pub(crate) use outcome::{FaultLog, record_hit, record_miss};
