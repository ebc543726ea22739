//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::entities::BitcoinRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("row could not be decoded: {message}")]
    Decode { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Store of record for price records.
///
/// Absence is reported as `Ok(None)`; `Err` is reserved for store failures.
#[async_trait]
pub trait BitcoinsRepo: Send + Sync {
    /// Every record ordered by price descending, one result per row so a
    /// single undecodable row does not abort the scan. Ranks are not set.
    fn stream_by_price_desc(&self) -> BoxStream<'_, Result<BitcoinRecord, RepoError>>;

    /// Every record in ranking order with row-number ranks assigned.
    async fn list_ranked(&self) -> Result<Vec<BitcoinRecord>, RepoError>;

    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError>;

    /// Insert, or update price and refresh `updated_at` when the symbol exists.
    /// `created_at` of an existing record is preserved.
    async fn upsert(&self, symbol: &str, price: i64) -> Result<BitcoinRecord, RepoError>;

    /// Delete and return the removed record.
    async fn delete(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), RepoError>;
}
