//! Domain entities mirrored from persistent storage.

use coinrank_api_types::BitcoinResponse;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One price record keyed by its symbol.
///
/// This is also the cached representation, so it round-trips through JSON.
/// `rank` is derived and only set on entries of a ranked listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinRecord {
    pub symbol: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BitcoinRecord {
    pub fn without_rank(mut self) -> Self {
        self.rank = None;
        self
    }
}

impl From<BitcoinRecord> for BitcoinResponse {
    fn from(record: BitcoinRecord) -> Self {
        Self {
            symbol: record.symbol,
            price: record.price,
            rank: record.rank,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(rank: Option<i64>) -> BitcoinRecord {
        BitcoinRecord {
            symbol: "BTC".to_string(),
            price: 65_000,
            rank,
            created_at: datetime!(2024-05-01 12:00:00.123456 UTC),
            updated_at: datetime!(2024-05-02 08:30 UTC),
        }
    }

    #[test]
    fn cached_json_survives_a_round_trip() {
        let original = record(Some(1));
        let encoded = serde_json::to_vec(&original).expect("encode");
        let decoded: BitcoinRecord = serde_json::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, original);
    }

    #[test]
    fn unranked_records_do_not_carry_a_rank_field() {
        let json = serde_json::to_value(record(Some(3)).without_rank()).expect("encode");
        assert!(json.get("rank").is_none());
        assert_eq!(json["symbol"], "BTC");
    }
}
