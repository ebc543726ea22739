use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use time::OffsetDateTime;

use crate::{
    application::repos::{BitcoinsRepo, RepoError},
    domain::entities::BitcoinRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const SELECT_BY_PRICE: &str = r#"
    SELECT symbol, price, created_at, updated_at
    FROM bitcoins
    ORDER BY price DESC, symbol COLLATE "C" ASC
"#;

const SELECT_RANKED: &str = r#"
    SELECT
        symbol,
        price,
        created_at,
        updated_at,
        ROW_NUMBER() OVER (ORDER BY price DESC, symbol COLLATE "C" ASC) AS rank
    FROM bitcoins
    ORDER BY price DESC, symbol COLLATE "C" ASC
"#;

const SELECT_BY_SYMBOL: &str = r#"
    SELECT symbol, price, created_at, updated_at
    FROM bitcoins
    WHERE symbol = $1
"#;

const UPSERT: &str = r#"
    INSERT INTO bitcoins (symbol, price)
    VALUES ($1, $2)
    ON CONFLICT (symbol)
    DO UPDATE SET price = EXCLUDED.price, updated_at = now()
    RETURNING symbol, price, created_at, updated_at
"#;

const DELETE_RETURNING: &str = r#"
    DELETE FROM bitcoins
    WHERE symbol = $1
    RETURNING symbol, price, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct BitcoinRow {
    symbol: String,
    price: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BitcoinRow> for BitcoinRecord {
    fn from(row: BitcoinRow) -> Self {
        Self {
            symbol: row.symbol,
            price: row.price,
            rank: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RankedBitcoinRow {
    symbol: String,
    price: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    rank: i64,
}

impl From<RankedBitcoinRow> for BitcoinRecord {
    fn from(row: RankedBitcoinRow) -> Self {
        Self {
            symbol: row.symbol,
            price: row.price,
            rank: Some(row.rank),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl BitcoinsRepo for PostgresRepositories {
    fn stream_by_price_desc(&self) -> BoxStream<'_, Result<BitcoinRecord, RepoError>> {
        let stream = sqlx::query_as::<_, BitcoinRow>(SELECT_BY_PRICE)
            .fetch(self.pool())
            .map(|row| match row {
                Ok(row) => Ok(BitcoinRecord::from(row)),
                Err(err) => Err(map_sqlx_error(err)),
            });

        Box::pin(stream)
    }

    async fn list_ranked(&self) -> Result<Vec<BitcoinRecord>, RepoError> {
        let rows = sqlx::query_as::<_, RankedBitcoinRow>(SELECT_RANKED)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BitcoinRecord::from).collect())
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError> {
        let row = sqlx::query_as::<_, BitcoinRow>(SELECT_BY_SYMBOL)
            .bind(symbol)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BitcoinRecord::from))
    }

    async fn upsert(&self, symbol: &str, price: i64) -> Result<BitcoinRecord, RepoError> {
        let row = sqlx::query_as::<_, BitcoinRow>(UPSERT)
            .bind(symbol)
            .bind(price)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(BitcoinRecord::from(row))
    }

    async fn delete(&self, symbol: &str) -> Result<Option<BitcoinRecord>, RepoError> {
        let row = sqlx::query_as::<_, BitcoinRow>(DELETE_RETURNING)
            .bind(symbol)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(BitcoinRecord::from))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
