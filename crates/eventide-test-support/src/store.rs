//! In-memory store — a transactional `EventStore` for tests.
//!
//! Writes are staged per transaction and become visible on commit. Row locks
//! are real: a second transaction locking the same aggregate waits until the
//! first one commits or rolls back.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventide_core::store::{AggregateRow, EventStore, EventStoreRecord, StoreError, Transaction};
use tokio::sync::OwnedMutexGuard;

type RowKey = (String, String);

fn row_key(aggregate_type: &str, aggregate_id: &str) -> RowKey {
    (aggregate_type.to_owned(), aggregate_id.to_owned())
}

/// Operation at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `EventStore::begin`.
    Begin,
    /// `Transaction::lock_for_update`.
    LockForUpdate,
    /// `Transaction::upsert`.
    Upsert,
    /// `Transaction::insert_append_only`.
    InsertEvent,
    /// `Transaction::commit`.
    Commit,
}

#[derive(Debug, Default)]
struct Committed {
    aggregates: HashMap<RowKey, AggregateRow>,
    events: Vec<EventStoreRecord>,
    projections: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct Inner {
    committed: Mutex<Committed>,
    row_locks: Mutex<HashMap<RowKey, Arc<tokio::sync::Mutex<()>>>>,
    failure: Mutex<Option<FailurePoint>>,
}

impl Inner {
    fn check(&self, point: FailurePoint) -> Result<(), StoreError> {
        if *self.failure.lock().unwrap() == Some(point) {
            return Err(StoreError::Backend(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn row_lock(&self, key: &RowKey) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.row_locks.lock().unwrap().entry(key.clone()).or_default())
    }
}

/// A transactional in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call at `point` fail with a backend error.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_at(&self, point: FailurePoint) {
        *self.inner.failure.lock().unwrap() = Some(point);
    }

    /// Remove any injected failure.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_failure(&self) {
        *self.inner.failure.lock().unwrap() = None;
    }

    /// Returns the committed aggregate row, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn aggregate(&self, aggregate_type: &str, aggregate_id: &str) -> Option<AggregateRow> {
        self.inner
            .committed
            .lock()
            .unwrap()
            .aggregates
            .get(&row_key(aggregate_type, aggregate_id))
            .cloned()
    }

    /// Returns all committed event records in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<EventStoreRecord> {
        self.inner.committed.lock().unwrap().events.clone()
    }

    /// Returns a committed projection value.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn projection(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.committed.lock().unwrap().projections.get(key).cloned()
    }

    /// Appends a record directly to the committed log, bypassing the
    /// pipeline. Used to seed histories.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_event(&self, record: EventStoreRecord) {
        self.inner.committed.lock().unwrap().events.push(record);
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        self.inner.check(FailurePoint::Begin)?;
        Ok(Box::new(InMemoryTransaction {
            inner: Arc::clone(&self.inner),
            aggregates: HashMap::new(),
            events: Vec::new(),
            projections: HashMap::new(),
            locked: HashSet::new(),
            guards: Vec::new(),
        }))
    }
}

/// A transaction on an [`InMemoryStore`]. Holds its row locks until it is
/// committed, rolled back or dropped.
#[derive(Debug)]
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    aggregates: HashMap<RowKey, AggregateRow>,
    events: Vec<EventStoreRecord>,
    projections: HashMap<String, serde_json::Value>,
    locked: HashSet<RowKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl InMemoryTransaction {
    /// Stages a projection write, visible to other transactions on commit.
    pub fn put_projection(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.projections.insert(key.into(), value);
    }

    /// Reads a projection, staged writes first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn projection(&self, key: &str) -> Option<serde_json::Value> {
        self.projections
            .get(key)
            .cloned()
            .or_else(|| self.inner.committed.lock().unwrap().projections.get(key).cloned())
    }

    fn read_row(&self, key: &RowKey) -> Option<AggregateRow> {
        self.aggregates
            .get(key)
            .cloned()
            .or_else(|| self.inner.committed.lock().unwrap().aggregates.get(key).cloned())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_for_update(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError> {
        self.inner.check(FailurePoint::LockForUpdate)?;
        let key = row_key(aggregate_type, aggregate_id);
        if !self.locked.contains(&key) {
            let lock = self.inner.row_lock(&key);
            self.guards.push(lock.lock_owned().await);
            self.locked.insert(key.clone());
        }
        Ok(self.read_row(&key))
    }

    async fn find_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Option<AggregateRow>, StoreError> {
        Ok(self.read_row(&row_key(aggregate_type, aggregate_id)))
    }

    async fn upsert(&mut self, row: &AggregateRow) -> Result<(), StoreError> {
        self.inner.check(FailurePoint::Upsert)?;
        self.aggregates
            .insert(row_key(&row.aggregate_type, &row.id), row.clone());
        Ok(())
    }

    async fn insert_append_only(&mut self, record: &EventStoreRecord) -> Result<(), StoreError> {
        self.inner.check(FailurePoint::InsertEvent)?;
        let duplicate = self.events.iter().any(|staged| staged.id == record.id)
            || self
                .inner
                .committed
                .lock()
                .unwrap()
                .events
                .iter()
                .any(|committed| committed.id == record.id);
        if duplicate {
            return Err(StoreError::Duplicate(format!("event {}", record.id)));
        }
        self.events.push(record.clone());
        Ok(())
    }

    async fn query_events_for_aggregate(
        &mut self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> Result<Vec<EventStoreRecord>, StoreError> {
        let mut records: Vec<EventStoreRecord> = self
            .inner
            .committed
            .lock()
            .unwrap()
            .events
            .iter()
            .chain(self.events.iter())
            .filter(|record| {
                record.aggregate_type == aggregate_type && record.aggregate_id == aggregate_id
            })
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps.
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.check(FailurePoint::Commit)?;
        let this = *self;
        let mut committed = this.inner.committed.lock().unwrap();
        committed.aggregates.extend(this.aggregates);
        committed.events.extend(this.events);
        committed.projections.extend(this.projections);
        // Row locks are released when `this.guards` drops, after the writes
        // above are visible.
        drop(committed);
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
