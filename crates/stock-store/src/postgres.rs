use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EntryId, EntryQuery, ItemId, ItemRecord, Quantity, ReasonCode, Result,
    SequenceNumber, StockEntry, StoreError, Timestamp,
    store::{EntryStream, StockStore, validate_entries_for_append},
};

const ENTRY_COLUMNS: &str =
    "entry_id, item_id, sequence, delta, timestamp, reason, reference, recorded_at";

const ITEM_COLUMNS: &str = "item_id, name, low_threshold, origin, first_seen, registered_at";

/// PostgreSQL-backed stock store.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_entry(row: PgRow) -> Result<StockEntry> {
        let reason = row
            .try_get::<Option<String>, _>("reason")?
            .map(|r| {
                r.parse::<ReasonCode>()
                    .map_err(|e| StoreError::Corrupt(e.to_string()))
            })
            .transpose()?;

        Ok(StockEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("entry_id")?),
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            sequence: SequenceNumber::new(row.try_get("sequence")?),
            delta: Quantity::new(row.try_get("delta")?),
            timestamp: Timestamp::logical(row.try_get("timestamp")?),
            reason,
            reference: row.try_get("reference")?,
            recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<ItemRecord> {
        Ok(ItemRecord {
            item_id: ItemId::new(row.try_get::<String, _>("item_id")?),
            name: row.try_get("name")?,
            threshold: row
                .try_get::<Option<i64>, _>("low_threshold")?
                .map(Quantity::new),
            origin: row.try_get::<String, _>("origin")?.parse()?,
            first_seen: row
                .try_get::<Option<i64>, _>("first_seen")?
                .map(Timestamp::logical),
            registered_at: row.try_get::<DateTime<Utc>, _>("registered_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn append(&self, entries: Vec<StockEntry>) -> Result<()> {
        let firsts = validate_entries_for_append(&entries)?;

        let mut tx = self.pool.begin().await?;

        for (item_id, first) in &firsts {
            let last: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence) FROM stock_entries WHERE item_id = $1")
                    .bind(item_id.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
            let last = SequenceNumber::new(last.unwrap_or(0));

            if *first != last.next() {
                return Err(StoreError::SequenceConflict {
                    item_id: item_id.clone(),
                    expected: last.next(),
                    actual: *first,
                });
            }
        }

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO stock_entries (entry_id, item_id, sequence, delta, timestamp, reason, reference, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.entry_id.as_uuid())
            .bind(entry.item_id.as_str())
            .bind(entry.sequence.as_i64())
            .bind(entry.delta.as_i64())
            .bind(entry.timestamp.as_i64())
            .bind(entry.reason.map(|r| r.as_str()))
            .bind(entry.reference.as_deref())
            .bind(entry.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer got there first
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_item_sequence")
                {
                    return StoreError::SequenceConflict {
                        item_id: entry.item_id.clone(),
                        expected: entry.sequence.next(),
                        actual: entry.sequence,
                    };
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        tracing::debug!(entries = entries.len(), items = firsts.len(), "stock entries persisted");
        Ok(())
    }

    async fn get_entries_for_item(&self, item_id: &ItemId) -> Result<Vec<StockEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE item_id = $1 ORDER BY sequence ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(item_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn stream_item_entries(
        &self,
        item_id: &ItemId,
        up_to: SequenceNumber,
    ) -> Result<EntryStream> {
        use futures_util::StreamExt;

        let pool = self.pool.clone();
        let item_id = item_id.as_str().to_string();
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM stock_entries \
             WHERE item_id = $1 AND sequence <= $2 ORDER BY sequence ASC"
        );

        // The query borrows its SQL and pool, so run it inside an owned stream
        let stream = async_stream_rows(pool, sql, move |q| q.bind(item_id).bind(up_to.as_i64()))
            .map(|result| result.and_then(Self::row_to_entry));

        Ok(Box::pin(stream))
    }

    async fn query_entries(&self, query: EntryQuery) -> Result<Vec<StockEntry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM stock_entries WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.item_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND item_id = ${param_count}"));
        }
        if query.reason.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND reason = ${param_count}"));
        }
        if query.from_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence >= ${param_count}"));
        }
        if query.to_sequence.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sequence <= ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY item_id ASC, sequence ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(ref item_id) = query.item_id {
            sqlx_query = sqlx_query.bind(item_id.as_str());
        }
        if let Some(reason) = query.reason {
            sqlx_query = sqlx_query.bind(reason.as_str());
        }
        if let Some(from) = query.from_sequence {
            sqlx_query = sqlx_query.bind(from.as_i64());
        }
        if let Some(to) = query.to_sequence {
            sqlx_query = sqlx_query.bind(to.as_i64());
        }
        if let Some(from) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from.as_i64());
        }
        if let Some(to) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to.as_i64());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn stream_all_entries(&self) -> Result<EntryStream> {
        use futures_util::StreamExt;

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM stock_entries ORDER BY position ASC");
        let stream = async_stream_rows(self.pool.clone(), sql, |q| q)
            .map(|result| result.and_then(Self::row_to_entry));

        Ok(Box::pin(stream))
    }

    async fn get_last_sequence(&self, item_id: &ItemId) -> Result<Option<SequenceNumber>> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM stock_entries WHERE item_id = $1")
                .bind(item_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(last.map(SequenceNumber::new))
    }

    async fn save_item(&self, item: ItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_items (item_id, name, low_threshold, origin, first_seen, registered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (item_id) DO UPDATE SET
                name = EXCLUDED.name,
                low_threshold = EXCLUDED.low_threshold,
                origin = EXCLUDED.origin,
                first_seen = EXCLUDED.first_seen,
                registered_at = EXCLUDED.registered_at
            "#,
        )
        .bind(item.item_id.as_str())
        .bind(item.name.as_deref())
        .bind(item.threshold.map(|t| t.as_i64()))
        .bind(item.origin.as_str())
        .bind(item.first_seen.map(|t| t.as_i64()))
        .bind(item.registered_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_item(&self, item_id: &ItemId) -> Result<Option<ItemRecord>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM stock_items WHERE item_id = $1");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(item_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn list_items(&self) -> Result<Vec<ItemRecord>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM stock_items ORDER BY item_id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

/// Runs a query and yields its rows as an owned stream.
///
/// `sqlx::query(..).fetch(..)` borrows the SQL string and the pool, so it
/// cannot outlive the calling method; this moves both into the stream.
fn async_stream_rows<F>(
    pool: PgPool,
    sql: String,
    bind: F,
) -> impl futures_core::Stream<Item = Result<PgRow>> + Send + 'static
where
    F: for<'q> FnOnce(PgQuery<'q>) -> PgQuery<'q> + Send + 'static,
{
    use futures_util::{StreamExt, TryStreamExt, stream};

    stream::once(async move {
        let rows = bind(sqlx::query(&sql)).fetch(&pool).map_err(StoreError::Database);
        // Collecting keeps the stream 'static; history per item is bounded
        rows.collect::<Vec<_>>().await
    })
    .flat_map(stream::iter)
}
