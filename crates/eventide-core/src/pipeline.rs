//! Command execution pipeline.
//!
//! A command runs as one unit of work: lock, validate, build the event,
//! apply it, persist aggregate and event, dispatch to synchronous reactors.
//! Any failure leaves the transaction to be rolled back in full.

use std::sync::Arc;

use crate::aggregate::{Aggregate, apply_event};
use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::error::DomainError;
use crate::event::{DomainEvent, Event, EventData, EventKind, Metadata};
use crate::id::{IdGenerator, UuidGenerator};
use crate::reactor::{AsyncReactor, EventMatcher, PendingReactions, ReactorBus, SyncReactor};
use crate::registry::EventRegistry;
use crate::replay;
use crate::store::{AggregateRow, EventStore, EventStoreRecord, Transaction};

/// Registration entry point. Collects event types and reactor
/// subscriptions, then freezes them into a [`Runtime`].
pub struct RuntimeBuilder {
    store: Arc<dyn EventStore>,
    registry: EventRegistry,
    reactors: ReactorBus,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl RuntimeBuilder {
    /// Starts a builder over `store`, with the system clock and UUID ids.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            registry: EventRegistry::new(),
            reactors: ReactorBus::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Replaces the clock used to timestamp events.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the generator of event and aggregate ids.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Registers every kind of the payload family `D`.
    #[must_use]
    pub fn register<D: EventData>(mut self) -> Self {
        self.registry.register::<D>();
        self
    }

    /// Registers one kind as decodable by the payload family `D`.
    #[must_use]
    pub fn register_event_type<D: EventData>(mut self, kind: EventKind) -> Self {
        self.registry.register_event_type::<D>(kind);
        self
    }

    /// Subscribes reactors to the events `matcher` accepts.
    #[must_use]
    pub fn on(
        mut self,
        matcher: EventMatcher,
        sync: Vec<Arc<dyn SyncReactor>>,
        r#async: Vec<Arc<dyn AsyncReactor>>,
    ) -> Self {
        self.reactors.subscribe(matcher, sync, r#async);
        self
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> Runtime {
        tracing::info!(
            event_types = self.registry.len(),
            subscriptions = self.reactors.len(),
            "event runtime initialized"
        );
        Runtime {
            store: self.store,
            registry: Arc::new(self.registry),
            reactors: Arc::new(self.reactors),
            clock: self.clock,
            ids: self.ids,
        }
    }
}

/// Executes commands and answers history queries. Cheap to clone; the
/// registry and reactor bus are shared and immutable.
#[derive(Clone)]
pub struct Runtime {
    store: Arc<dyn EventStore>,
    registry: Arc<EventRegistry>,
    reactors: Arc<ReactorBus>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("reactors", &self.reactors)
            .finish_non_exhaustive()
    }
}

/// An open transaction plus the asynchronous reactions its commands queued.
///
/// Asynchronous reactors are spawned only by [`TransactionScope::commit`]
/// once the store commit succeeded; rolling back or dropping the scope
/// discards them.
pub struct TransactionScope {
    tx: Box<dyn Transaction>,
    deferred: Vec<(Arc<dyn DomainEvent>, PendingReactions)>,
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

impl TransactionScope {
    /// Wraps a store transaction.
    #[must_use]
    pub fn new(tx: Box<dyn Transaction>) -> Self {
        Self {
            tx,
            deferred: Vec::new(),
        }
    }

    /// Returns the underlying transaction.
    pub fn transaction(&mut self) -> &mut dyn Transaction {
        self.tx.as_mut()
    }

    fn defer(&mut self, event: Arc<dyn DomainEvent>, pending: PendingReactions) {
        self.deferred.push((event, pending));
    }

    /// Commits the transaction, then schedules the queued asynchronous
    /// reactors.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CommitFailed` if the store rejects the commit;
    /// nothing is scheduled in that case.
    pub async fn commit(self) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(DomainError::CommitFailed)?;
        for (event, pending) in self.deferred {
            tracing::debug!(
                event_id = event.event_id(),
                reactors = pending.len(),
                "scheduling async reactors"
            );
            pending.spawn(&event);
        }
        Ok(())
    }

    /// Rolls the transaction back and discards queued reactions.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PersistenceFailed` if the store reports a
    /// rollback failure.
    pub async fn rollback(self) -> Result<(), DomainError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl Runtime {
    /// Returns the event type registry.
    #[must_use]
    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Opens a transaction scope for [`Runtime::execute_tx`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PersistenceFailed` if the store cannot begin a
    /// transaction.
    pub async fn begin(&self) -> Result<TransactionScope, DomainError> {
        Ok(TransactionScope::new(self.store.begin().await?))
    }

    /// Executes `command` in its own transaction: commits on success, rolls
    /// back on any failure and surfaces the same error.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Runtime::execute_tx`] returns, or
    /// `DomainError::CommitFailed`.
    #[tracing::instrument(
        skip(self, command, aggregate, metadata),
        fields(command = command.command_type(), aggregate_type = <C::Aggregate as Aggregate>::AGGREGATE_TYPE)
    )]
    pub async fn execute<C: Command>(
        &self,
        command: &C,
        aggregate: &mut C::Aggregate,
        metadata: Option<Metadata>,
    ) -> Result<Event<<C::Aggregate as Aggregate>::Event>, DomainError> {
        let mut scope = self.begin().await?;
        let before = aggregate.clone();

        match self.execute_tx(&mut scope, command, aggregate, metadata).await {
            Ok(event) => {
                if let Err(err) = scope.commit().await {
                    *aggregate = before;
                    return Err(err);
                }
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    "command committed"
                );
                Ok(event)
            }
            Err(err) => {
                tracing::warn!(error = %err, "command failed, rolling back");
                if let Err(rollback_err) = scope.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Executes `command` against `aggregate` inside `scope` and returns the
    /// produced event. Committing or rolling back the scope is the caller's
    /// responsibility.
    ///
    /// On success `aggregate` holds the new state. On failure it holds the
    /// state read under the row lock, with nothing applied.
    ///
    /// # Errors
    ///
    /// - `DomainError::TypeMismatch` if command, aggregate and payload
    ///   disagree on the aggregate type.
    /// - `DomainError::InvalidAggregateReference` if the aggregate carries an
    ///   id with no persisted row.
    /// - `DomainError::ValidationFailed` / `DomainError::CommandFailed` from
    ///   the command.
    /// - `DomainError::SerializationFailed` / `DomainError::PersistenceFailed`
    ///   from writing the aggregate or the event.
    /// - `DomainError::ReactorFailed` from a synchronous reactor.
    #[tracing::instrument(
        skip(self, scope, command, aggregate, metadata),
        fields(
            command = command.command_type(),
            aggregate_type = <C::Aggregate as Aggregate>::AGGREGATE_TYPE,
            aggregate_id = aggregate.id()
        )
    )]
    pub async fn execute_tx<C: Command>(
        &self,
        scope: &mut TransactionScope,
        command: &C,
        aggregate: &mut C::Aggregate,
        metadata: Option<Metadata>,
    ) -> Result<Event<<C::Aggregate as Aggregate>::Event>, DomainError> {
        if command.aggregate_type() != aggregate.aggregate_type() {
            return Err(DomainError::TypeMismatch {
                command: command.aggregate_type().to_owned(),
                aggregate: aggregate.aggregate_type().to_owned(),
            });
        }

        // Existing aggregates are locked and re-read so concurrent commands on
        // the same id serialize. Creation needs no lock.
        if !aggregate.id().is_empty() {
            let row = scope
                .transaction()
                .lock_for_update(<C::Aggregate as Aggregate>::AGGREGATE_TYPE, aggregate.id())
                .await?
                .ok_or_else(|| DomainError::InvalidAggregateReference {
                    aggregate_type: <C::Aggregate as Aggregate>::AGGREGATE_TYPE.to_owned(),
                    aggregate_id: aggregate.id().to_owned(),
                })?;
            *aggregate = row.into_aggregate()?;
            tracing::debug!(version = aggregate.version(), "aggregate row locked");
        }

        command.validate(scope.transaction(), aggregate).await?;

        let payload = command.build_payload(self.ids.as_ref())?;
        let kind = payload.data.kind();
        if kind.aggregate_type != aggregate.aggregate_type() {
            return Err(DomainError::TypeMismatch {
                command: kind.aggregate_type.to_owned(),
                aggregate: aggregate.aggregate_type().to_owned(),
            });
        }

        let mut event = Event::build(
            payload,
            metadata,
            aggregate.id(),
            self.clock.as_ref(),
            self.ids.as_ref(),
        );

        let mut next = aggregate.clone();
        apply_event(&mut next, &event);
        if next.id().is_empty() {
            return Err(DomainError::CommandFailed(format!(
                "{} did not assign an aggregate id",
                event.event_type
            )));
        }
        if !aggregate.id().is_empty() && next.id() != aggregate.id() {
            return Err(DomainError::CommandFailed(format!(
                "{} would reassign aggregate {} to {}",
                event.event_type,
                aggregate.id(),
                next.id()
            )));
        }
        // Create-style payloads assign the id while being applied.
        event.aggregate_id = next.id().to_owned();

        let row = AggregateRow::from_aggregate(&next)?;
        scope.transaction().upsert(&row).await?;

        let record = event.encode()?;
        scope.transaction().insert_append_only(&record).await?;

        let pending = self.reactors.dispatch(scope.transaction(), &event).await?;
        if !pending.is_empty() {
            scope.defer(Arc::new(event.clone()), pending);
        }

        *aggregate = next;
        tracing::debug!(
            event_id = %event.id,
            version = aggregate.version(),
            "event applied and appended"
        );
        Ok(event)
    }

    /// Reads the persisted aggregate row, without locking it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PersistenceFailed` on store errors and
    /// `DomainError::DeserializationFailed` if the row does not decode.
    pub async fn load<A: Aggregate>(&self, aggregate_id: &str) -> Result<Option<A>, DomainError> {
        let mut scope = self.begin().await?;
        let row = scope
            .transaction()
            .find_aggregate(A::AGGREGATE_TYPE, aggregate_id)
            .await;
        scope.rollback().await?;
        row?.map(AggregateRow::into_aggregate::<A>).transpose()
    }

    async fn history<A: Aggregate>(&self, aggregate_id: &str) -> Result<Vec<EventStoreRecord>, DomainError> {
        let mut scope = self.begin().await?;
        let records = scope
            .transaction()
            .query_events_for_aggregate(A::AGGREGATE_TYPE, aggregate_id)
            .await;
        scope.rollback().await?;
        Ok(records?)
    }

    /// Decodes the full event history of an aggregate, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PersistenceFailed` on store errors and the
    /// registry's decode errors for records that do not decode.
    pub async fn events<A: Aggregate>(
        &self,
        aggregate_id: &str,
    ) -> Result<Vec<Event<A::Event>>, DomainError> {
        let records = self.history::<A>(aggregate_id).await?;
        replay::decode_history::<A::Event>(&self.registry, &records)
    }

    /// Rebuilds an aggregate by folding its full history over
    /// `A::default()`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if the aggregate has no
    /// events, plus the errors of [`Runtime::events`].
    pub async fn replay<A: Aggregate>(&self, aggregate_id: &str) -> Result<A, DomainError> {
        let records = self.history::<A>(aggregate_id).await?;
        if records.is_empty() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::AGGREGATE_TYPE.to_owned(),
                aggregate_id: aggregate_id.to_owned(),
            });
        }
        replay::replay::<A>(&self.registry, &records)
    }
}
