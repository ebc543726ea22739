//! Row-number ranking by price.
//!
//! Equal prices never share a rank: every entry gets `1 + <entries before it>`.
//! Ties are ordered by symbol bytes (the `"C"` collation in Postgres) so the listing is deterministic.

use std::cmp::Ordering;

use super::entities::BitcoinRecord;

/// Ordering used by every ranked listing: price descending, then symbol ascending.
pub fn ranking_order(a: &BitcoinRecord, b: &BitcoinRecord) -> Ordering {
    b.price.cmp(&a.price).then_with(|| a.symbol.cmp(&b.symbol))
}

/// Sort `records` into ranking order and number them from 1.
pub fn assign_row_ranks(mut records: Vec<BitcoinRecord>) -> Vec<BitcoinRecord> {
    records.sort_by(ranking_order);
    for (position, record) in records.iter_mut().enumerate() {
        record.rank = Some(position as i64 + 1);
    }
    records
}

/// True when prices never increase along the listing and ranks run 1, 2, 3, ...
pub fn is_ranked_order(records: &[BitcoinRecord]) -> bool {
    let prices_ok = records.windows(2).all(|pair| pair[0].price >= pair[1].price);
    let ranks_ok = records
        .iter()
        .enumerate()
        .all(|(position, record)| record.rank == Some(position as i64 + 1));
    prices_ok && ranks_ok
}
