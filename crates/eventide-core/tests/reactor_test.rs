mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{ClosedV1, OpenedV1, TicketEvent, fixed_now};
use eventide_core::clock::Clock;
use eventide_core::id::IdGenerator;
use eventide_core::{
    DomainError, DomainEvent, Event, EventKind, EventMatcher, EventStore, Payload, ReactorBus,
    SyncReactor, Transaction,
};
use eventide_test_support::{
    ChannelAsyncReactor, FailingSyncReactor, FixedClock, InMemoryStore, SequenceIds,
};

/// Appends its label to a shared log.
struct LogReactor {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl SyncReactor for LogReactor {
    fn name(&self) -> &str {
        self.label
    }

    async fn react(&self, _tx: &mut dyn Transaction, _event: &dyn DomainEvent) -> Result<(), DomainError> {
        self.log.lock().unwrap().push(self.label);
        Ok(())
    }
}

fn log_reactor(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn SyncReactor> {
    Arc::new(LogReactor {
        label,
        log: Arc::clone(log),
    })
}

fn build_event(data: TicketEvent) -> Event<TicketEvent> {
    let clock: &dyn Clock = &FixedClock(fixed_now());
    let ids: &dyn IdGenerator = &SequenceIds::new("evt");
    Event::build(Payload::new(data), None, "t-1", clock, ids)
}

fn opened() -> Event<TicketEvent> {
    build_event(TicketEvent::Opened(OpenedV1 {
        id: "t-1".into(),
        title: "x".into(),
    }))
}

#[test]
fn test_matchers_select_by_kind_aggregate_and_union() {
    let opened = opened();
    let closed = build_event(TicketEvent::Closed(ClosedV1 {}));
    let user_created = EventMatcher::event(EventKind::new("user", "created", 1));

    assert!(EventMatcher::Any.matches(&opened));
    assert!(EventMatcher::event(TicketEvent::OPENED).matches(&opened));
    assert!(!EventMatcher::event(TicketEvent::OPENED).matches(&closed));
    assert!(!EventMatcher::event(EventKind::new("ticket", "opened", 2)).matches(&opened));
    assert!(EventMatcher::aggregate::<common::Ticket>().matches(&closed));
    assert!(!EventMatcher::AggregateType("user".into()).matches(&closed));
    assert!(
        EventMatcher::any_of([user_created.clone(), EventMatcher::event(TicketEvent::CLOSED)])
            .matches(&closed)
    );
    assert!(!EventMatcher::any_of([user_created]).matches(&closed));
    assert!(!EventMatcher::AnyOf(Vec::new()).matches(&closed));
}

#[tokio::test]
async fn test_dispatch_runs_matching_sync_reactors_in_registration_order() {
    // Arrange
    let log = Arc::new(Mutex::new(Vec::new()));
    let (async_reactor, _received) = ChannelAsyncReactor::new();
    let mut bus = ReactorBus::new();
    bus.subscribe(
        EventMatcher::Any,
        vec![log_reactor("a", &log), log_reactor("b", &log)],
        vec![],
    );
    bus.subscribe(
        EventMatcher::AggregateType("user".into()),
        vec![log_reactor("skipped", &log)],
        vec![],
    );
    bus.subscribe(
        EventMatcher::event(TicketEvent::OPENED),
        vec![log_reactor("c", &log)],
        vec![Arc::new(async_reactor)],
    );
    let store = InMemoryStore::new();
    let mut tx = store.begin().await.unwrap();

    // Act
    let pending = bus.dispatch(tx.as_mut(), &opened()).await.unwrap();

    // Assert
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn test_first_sync_failure_stops_dispatch() {
    // Arrange
    let log = Arc::new(Mutex::new(Vec::new()));
    let (async_reactor, _received) = ChannelAsyncReactor::new();
    let mut bus = ReactorBus::new();
    bus.subscribe(
        EventMatcher::Any,
        vec![log_reactor("before", &log), Arc::new(FailingSyncReactor)],
        vec![Arc::new(async_reactor)],
    );
    bus.subscribe(EventMatcher::Any, vec![log_reactor("after", &log)], vec![]);
    let store = InMemoryStore::new();
    let mut tx = store.begin().await.unwrap();

    // Act
    let result = bus.dispatch(tx.as_mut(), &opened()).await;

    // Assert
    match result {
        Err(DomainError::ReactorFailed { reactor, .. }) => assert_eq!(reactor, "failing"),
        other => panic!("expected ReactorFailed, got {other:?}"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["before"]);
}

#[tokio::test]
async fn test_dispatch_without_matches_is_a_no_op() {
    let bus = ReactorBus::new();
    let store = InMemoryStore::new();
    let mut tx = store.begin().await.unwrap();

    let pending = bus.dispatch(tx.as_mut(), &opened()).await.unwrap();

    assert!(pending.is_empty());
    assert!(bus.is_empty());
}

#[test]
fn test_domain_event_downcasts_to_its_payload_family() {
    let event = opened();
    let erased: &dyn DomainEvent = &event;

    let typed = erased.downcast_ref::<TicketEvent>().unwrap();

    assert_eq!(typed.id, "evt-1");
    assert_eq!(erased.event_type(), "ticket.opened");
    assert_eq!(erased.to_payload().unwrap()["title"], "x");
}
