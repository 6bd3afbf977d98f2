//! Event store database schema.
//!
//! Mirrors `migrations/0001_create_event_store.sql`. Every aggregate type
//! shares the `aggregates` table and every event lands in `event_store`.

use sqlx::PgPool;

/// Table holding the current state of every aggregate.
pub const AGGREGATES_TABLE: &str = "aggregates";

/// Append-only event table.
pub const EVENT_STORE_TABLE: &str = "event_store";

/// SQL to create the aggregates table.
pub const CREATE_AGGREGATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aggregates (
    aggregate_type  VARCHAR(255) NOT NULL,
    id              TEXT NOT NULL,
    version         BIGINT NOT NULL,
    state           JSONB NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    deleted_at      TIMESTAMPTZ,
    PRIMARY KEY (aggregate_type, id)
);
";

/// SQL to create the event table and its append-only guard. `position`
/// orders events that share a timestamp.
pub const CREATE_EVENT_STORE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS event_store (
    id              TEXT PRIMARY KEY,
    position        BIGSERIAL NOT NULL UNIQUE,
    aggregate_id    TEXT NOT NULL,
    aggregate_type  VARCHAR(255) NOT NULL,
    action          VARCHAR(255) NOT NULL,
    schema_version  BIGINT NOT NULL,
    event_type      VARCHAR(511) NOT NULL,
    timestamp       TIMESTAMPTZ NOT NULL,
    data            JSONB NOT NULL,
    metadata        JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE INDEX IF NOT EXISTS idx_event_store_aggregate
    ON event_store (aggregate_type, aggregate_id, timestamp, position);

CREATE OR REPLACE FUNCTION event_store_reject_mutation() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'event_store is append-only';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS event_store_append_only ON event_store;
CREATE TRIGGER event_store_append_only
    BEFORE UPDATE OR DELETE ON event_store
    FOR EACH ROW EXECUTE FUNCTION event_store_reject_mutation();
";

/// Creates both tables if they do not exist.
///
/// # Errors
///
/// Returns the database error if a statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(CREATE_AGGREGATES_TABLE).execute(pool).await?;
    sqlx::raw_sql(CREATE_EVENT_STORE_TABLE).execute(pool).await?;
    tracing::info!(
        aggregates = AGGREGATES_TABLE,
        events = EVENT_STORE_TABLE,
        "event store schema ensured"
    );
    Ok(())
}
