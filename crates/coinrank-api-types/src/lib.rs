//! Request and response bodies exchanged with the coinrank HTTP API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A price record as returned by the API.
///
/// `rank` is only present on entries of the ranked listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinResponse {
    pub symbol: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Body of `POST /api/bitcoins`.
///
/// Both fields are required; they are optional here so the server can answer
/// with its own validation error instead of a generic decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertBitcoinRequest {
    pub symbol: Option<String>,
    pub price: Option<i64>,
}

/// Body of `PUT /api/bitcoins/{symbol}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePriceRequest {
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteBitcoinResponse {
    pub message: String,
    pub bitcoin: BitcoinResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub info: String,
}
