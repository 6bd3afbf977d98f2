//! Transaction contract towards the persistence backend.
//!
//! The runtime never talks to a database directly. A backend provides an
//! [`EventStore`] that opens [`Transaction`]s; everything a command writes
//! goes through one transaction and becomes visible together on commit.

use std::any::Any;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Durable form of an event. One row per event, append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStoreRecord {
    /// Unique event identifier.
    pub id: String,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Routing name of the aggregate.
    pub aggregate_type: String,
    /// Verb describing the change.
    pub action: String,
    /// Revision of the payload shape.
    pub schema_version: u64,
    /// `aggregate_type.action`.
    pub event_type: String,
    /// Event creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Serialized payload, decoded through the type registry.
    pub data: serde_json::Value,
    /// Serialized metadata.
    pub metadata: serde_json::Value,
}

impl EventStoreRecord {
    /// Registry key of the payload shape stored in this record.
    #[must_use]
    pub fn type_key(&self) -> String {
        crate::event::type_key(&self.aggregate_type, &self.action, self.schema_version)
    }
}

/// Persisted current state of one aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    /// Routing name of the aggregate.
    pub aggregate_type: String,
    /// Aggregate identifier.
    pub id: String,
    /// Number of events applied.
    pub version: u64,
    /// Full serialized aggregate.
    pub state: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last applied event.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AggregateRow {
    /// Snapshots an aggregate into its row form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SerializationFailed` if the aggregate cannot be
    /// serialized.
    pub fn from_aggregate<A: Aggregate>(aggregate: &A) -> Result<Self, DomainError> {
        let base = aggregate.base();
        let state = serde_json::to_value(aggregate).map_err(DomainError::SerializationFailed)?;
        Ok(Self {
            aggregate_type: A::AGGREGATE_TYPE.to_owned(),
            id: base.id.clone(),
            version: base.version(),
            state,
            created_at: base.created_at,
            updated_at: base.updated_at(),
            deleted_at: base.deleted_at,
        })
    }

    /// Rebuilds the aggregate stored in this row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DeserializationFailed` if the state does not
    /// match the aggregate's shape.
    pub fn into_aggregate<A: Aggregate>(self) -> Result<A, DomainError> {
        serde_json::from_value(self.state).map_err(|source| DomainError::DeserializationFailed {
            what: format!("aggregate {}", self.aggregate_type),
            source,
        })
    }
}

/// Errors reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key already exists.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// A row lock could not be acquired in time.
    #[error("lock not available: {0}")]
    LockNotAvailable(String),

    /// Any other backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Opens transactions against the persistence backend.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Begins a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// One unit of work against the persistence backend.
#[async_trait]
pub trait Transaction: Send + 'static {
    /// Locks the aggregate row exclusively until this transaction ends and
    /// returns its current state, or `None` if no row exists.
    async fn lock_for_update(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError>;

    /// Reads the aggregate row without locking it.
    async fn find_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError>;

    /// Inserts or replaces the aggregate row.
    async fn upsert(&mut self, row: &AggregateRow) -> Result<(), StoreError>;

    /// Appends an event record. Never updates an existing record.
    async fn insert_append_only(&mut self, record: &EventStoreRecord) -> Result<(), StoreError>;

    /// Returns the aggregate's event records ordered by timestamp ascending,
    /// insertion order breaking ties.
    async fn query_events_for_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<EventStoreRecord>, StoreError>;

    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;

    /// Upcast for backend-specific access, e.g. projections issuing their own
    /// SQL from a synchronous reactor.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Transaction {
    /// Returns the concrete transaction if it is a `T`.
    pub fn downcast_mut<T: Transaction>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
