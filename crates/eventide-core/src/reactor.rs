//! Reactor bus.
//!
//! A subscription pairs an [`EventMatcher`] with synchronous reactors, which
//! run inside the command's transaction and can veto it, and asynchronous
//! reactors, which run on their own tasks once the transaction committed.
//! Subscriptions are registered at startup and never removed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Instrument;

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::event::{DomainEvent, EventKind};
use crate::store::Transaction;

/// Predicate selecting the events a subscription reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMatcher {
    /// Matches every event.
    Any,
    /// Matches one exact `(aggregate_type, action, schema_version)` kind.
    Kind(EventKind),
    /// Matches every event of one aggregate type.
    AggregateType(String),
    /// Matches if any of the inner matchers does.
    AnyOf(Vec<EventMatcher>),
}

impl EventMatcher {
    /// Matches one exact event kind.
    #[must_use]
    pub fn event(kind: EventKind) -> Self {
        Self::Kind(kind)
    }

    /// Matches every event of aggregate `A`.
    #[must_use]
    pub fn aggregate<A: Aggregate>() -> Self {
        Self::AggregateType(A::AGGREGATE_TYPE.to_owned())
    }

    /// Matches if any of `matchers` does.
    #[must_use]
    pub fn any_of(matchers: impl IntoIterator<Item = EventMatcher>) -> Self {
        Self::AnyOf(matchers.into_iter().collect())
    }

    /// Returns whether the event is accepted.
    #[must_use]
    pub fn matches(&self, event: &dyn DomainEvent) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => {
                event.aggregate_type() == kind.aggregate_type
                    && event.action() == kind.action
                    && event.schema_version() == kind.schema_version
            }
            Self::AggregateType(aggregate_type) => event.aggregate_type() == aggregate_type,
            Self::AnyOf(matchers) => matchers.iter().any(|matcher| matcher.matches(event)),
        }
    }
}

/// Listener run inside the originating command's transaction. An error
/// aborts the command and rolls back everything it wrote.
#[async_trait]
pub trait SyncReactor: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Reacts to `event` using the command's transaction.
    ///
    /// # Errors
    ///
    /// Any error vetoes the command.
    async fn react(&self, tx: &mut dyn Transaction, event: &dyn DomainEvent) -> Result<(), DomainError>;
}

/// Best-effort listener run on its own task after the command committed.
///
/// Nothing consumes its outcome: a reactor that can fail reports the failure
/// itself.
#[async_trait]
pub trait AsyncReactor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Reacts to `event`.
    async fn react(&self, event: &dyn DomainEvent);
}

/// One registered subscription.
#[derive(Clone)]
pub struct Subscription {
    matcher: EventMatcher,
    sync: Vec<Arc<dyn SyncReactor>>,
    r#async: Vec<Arc<dyn AsyncReactor>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("matcher", &self.matcher)
            .field("sync", &self.sync.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("async", &self.r#async.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Ordered list of subscriptions.
#[derive(Debug, Clone, Default)]
pub struct ReactorBus {
    subscriptions: Vec<Subscription>,
}

/// Asynchronous reactors matched by a dispatch, waiting to be spawned.
#[derive(Clone, Default)]
pub struct PendingReactions {
    reactors: Vec<Arc<dyn AsyncReactor>>,
}

impl PendingReactions {
    /// Returns whether no asynchronous reactor matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reactors.is_empty()
    }

    /// Returns how many asynchronous reactors matched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    /// Spawns every reactor on its own tokio task. No ordering holds among
    /// them and their outcome is not observed.
    pub fn spawn(self, event: &Arc<dyn DomainEvent>) {
        for reactor in self.reactors {
            let event = Arc::clone(event);
            let span = tracing::debug_span!(
                "async_reactor",
                reactor = reactor.name(),
                event_id = event.event_id(),
                event_type = event.event_type(),
            );
            tokio::spawn(
                async move {
                    reactor.react(event.as_ref()).await;
                }
                .instrument(span),
            );
        }
    }
}

impl std::fmt::Debug for PendingReactions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.reactors.iter().map(|r| r.name()))
            .finish()
    }
}

impl ReactorBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscription. Registration order is dispatch order.
    pub fn subscribe(
        &mut self,
        matcher: EventMatcher,
        sync: Vec<Arc<dyn SyncReactor>>,
        r#async: Vec<Arc<dyn AsyncReactor>>,
    ) {
        self.subscriptions.push(Subscription {
            matcher,
            sync,
            r#async,
        });
    }

    /// Returns the number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns whether no subscription is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Runs the synchronous reactors of every matching subscription, in
    /// registration order, then returns the matching asynchronous reactors
    /// for the caller to schedule.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ReactorFailed` for the first synchronous reactor
    /// that fails; later reactors do not run and nothing is scheduled.
    pub async fn dispatch(
        &self,
        tx: &mut dyn Transaction,
        event: &dyn DomainEvent,
    ) -> Result<PendingReactions, DomainError> {
        let mut pending = PendingReactions::default();
        for subscription in self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.matcher.matches(event))
        {
            for reactor in &subscription.sync {
                tracing::debug!(reactor = reactor.name(), event_id = event.event_id(), "running sync reactor");
                reactor
                    .react(tx, event)
                    .await
                    .map_err(|source| DomainError::ReactorFailed {
                        reactor: reactor.name().to_owned(),
                        source: Box::new(source),
                    })?;
            }
            pending.reactors.extend(subscription.r#async.iter().cloned());
        }
        Ok(pending)
    }
}
