//! `PostgreSQL` implementation of the `EventStore` and `Transaction` traits.

use std::any::Any;
use std::time::Duration;

use async_trait::async_trait;
use eventide_core::store::{AggregateRow, EventStore, EventStoreRecord, StoreError, Transaction};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row};

use crate::config::PgStoreConfig;
use crate::error::{from_bigint, store_error, to_bigint};

const AGGREGATE_COLUMNS: &str = "aggregate_type, id, version, state, created_at, updated_at, deleted_at";

/// PostgreSQL-backed event store.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgEventStore {
    /// Creates a new `PgEventStore` that waits for row locks indefinitely.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Creates a store from a pool and the lock timeout in `config`.
    #[must_use]
    pub fn from_config(pool: PgPool, config: &PgStoreConfig) -> Self {
        Self {
            pool,
            lock_timeout: config.lock_timeout,
        }
    }

    /// Bounds how long `lock_for_update` waits before failing with
    /// `StoreError::LockNotAvailable`.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        if let Some(timeout) = self.lock_timeout {
            sqlx::query("SELECT set_config('lock_timeout', $1, true)")
                .bind(format!("{}ms", timeout.as_millis()))
                .execute(&mut *tx)
                .await
                .map_err(store_error)?;
        }
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// A database transaction. Row locks taken through it are held until it
/// commits or rolls back.
#[derive(Debug)]
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    /// The connection this transaction runs on. Synchronous reactors use it
    /// to write projections atomically with the event.
    pub fn as_sqlx(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    async fn select_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
        for_update: bool,
    ) -> Result<Option<AggregateRow>, StoreError> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!(
            "SELECT {AGGREGATE_COLUMNS} FROM aggregates WHERE aggregate_type = $1 AND id = $2{lock}"
        );
        let row = sqlx::query(&sql)
            .bind(aggregate_type)
            .bind(aggregate_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;
        row.as_ref().map(aggregate_from_row).transpose()
    }
}

fn aggregate_from_row(row: &PgRow) -> Result<AggregateRow, StoreError> {
    let version: i64 = row.try_get("version").map_err(store_error)?;
    let state: Json<serde_json::Value> = row.try_get("state").map_err(store_error)?;
    Ok(AggregateRow {
        aggregate_type: row.try_get("aggregate_type").map_err(store_error)?,
        id: row.try_get("id").map_err(store_error)?,
        version: from_bigint(version, "version")?,
        state: state.0,
        created_at: row.try_get("created_at").map_err(store_error)?,
        updated_at: row.try_get("updated_at").map_err(store_error)?,
        deleted_at: row.try_get("deleted_at").map_err(store_error)?,
    })
}

fn record_from_row(row: &PgRow) -> Result<EventStoreRecord, StoreError> {
    let schema_version: i64 = row.try_get("schema_version").map_err(store_error)?;
    let data: Json<serde_json::Value> = row.try_get("data").map_err(store_error)?;
    let metadata: Json<serde_json::Value> = row.try_get("metadata").map_err(store_error)?;
    Ok(EventStoreRecord {
        id: row.try_get("id").map_err(store_error)?,
        aggregate_id: row.try_get("aggregate_id").map_err(store_error)?,
        aggregate_type: row.try_get("aggregate_type").map_err(store_error)?,
        action: row.try_get("action").map_err(store_error)?,
        schema_version: from_bigint(schema_version, "schema_version")?,
        event_type: row.try_get("event_type").map_err(store_error)?,
        timestamp: row.try_get("timestamp").map_err(store_error)?,
        data: data.0,
        metadata: metadata.0,
    })
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn lock_for_update(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError> {
        tracing::debug!(aggregate_type, aggregate_id, "locking aggregate row");
        self.select_aggregate(aggregate_type, aggregate_id, true).await
    }

    async fn find_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError> {
        self.select_aggregate(aggregate_type, aggregate_id, false).await
    }

    async fn upsert(&mut self, row: &AggregateRow) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO aggregates (aggregate_type, id, version, state, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (aggregate_type, id) DO UPDATE SET
                version = EXCLUDED.version,
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at,
                deleted_at = EXCLUDED.deleted_at
            ",
        )
        .bind(&row.aggregate_type)
        .bind(&row.id)
        .bind(to_bigint(row.version, "version")?)
        .bind(Json(&row.state))
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        tracing::debug!(
            aggregate_type = %row.aggregate_type,
            aggregate_id = %row.id,
            version = row.version,
            "aggregate row upserted"
        );
        Ok(())
    }

    async fn insert_append_only(&mut self, record: &EventStoreRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO event_store
                (id, aggregate_id, aggregate_type, action, schema_version, event_type, timestamp, data, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&record.id)
        .bind(&record.aggregate_id)
        .bind(&record.aggregate_type)
        .bind(&record.action)
        .bind(to_bigint(record.schema_version, "schema_version")?)
        .bind(&record.event_type)
        .bind(record.timestamp)
        .bind(Json(&record.data))
        .bind(Json(&record.metadata))
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        tracing::debug!(event_id = %record.id, event_type = %record.event_type, "event appended");
        Ok(())
    }

    async fn query_events_for_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<EventStoreRecord>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, aggregate_id, aggregate_type, action, schema_version, event_type, timestamp, data, metadata
            FROM event_store
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY timestamp ASC, position ASC
            ",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx } = *self;
        tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgTransaction { tx } = *self;
        tx.rollback().await.map_err(store_error)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
