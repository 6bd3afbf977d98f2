mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::{
    Broken, Close, Label, Misrouted, Open, OpenWithSecret, Rename, Ticket, TicketEvent, builder,
    fixed_now,
};
use eventide_core::{Aggregate, DomainError, EventMatcher, Metadata, StoreError};
use eventide_test_support::{
    ChannelAsyncReactor, FailingSyncReactor, FailurePoint, InMemoryStore, RecordingSyncReactor,
};

async fn open_ticket(runtime: &eventide_core::Runtime, title: &str) -> Ticket {
    let mut ticket = Ticket::default();
    runtime
        .execute(&Open { title: title.to_owned() }, &mut ticket, None)
        .await
        .unwrap();
    ticket
}

#[tokio::test]
async fn test_create_assigns_id_version_and_timestamps() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut ticket = Ticket::default();

    // Act
    let event = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, None)
        .await
        .unwrap();

    // Assert
    assert_eq!(event.aggregate_id, "id-1");
    assert_eq!(event.id, "id-2");
    assert_eq!(event.event_type, "ticket.opened");
    assert_eq!(event.schema_version, 1);
    assert_eq!(event.timestamp, fixed_now());
    assert!(event.metadata.is_empty());
    assert_eq!(ticket.id(), "id-1");
    assert_eq!(ticket.version(), 1);
    assert_eq!(ticket.base.created_at, fixed_now());
    assert_eq!(ticket.base.updated_at(), fixed_now());
    assert_eq!(ticket.title, "first");

    let row = store.aggregate("ticket", "id-1").unwrap();
    assert_eq!(row.version, 1);
    assert_eq!(row.state["title"], "first");
    let events = store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].type_key(), "ticket.opened.1");
    assert_eq!(events[0].aggregate_id, "id-1");
}

#[tokio::test]
async fn test_update_increments_version_and_replays_to_same_state() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut ticket = open_ticket(&runtime, "first").await;

    // Act
    let event = runtime
        .execute(
            &Rename {
                title: "second".into(),
                expected_version: Some(1),
            },
            &mut ticket,
            None,
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(event.aggregate_id, "id-1");
    assert_eq!(event.timestamp, fixed_now() + ChronoDuration::seconds(1));
    assert_eq!(ticket.version(), 2);
    assert_eq!(ticket.title, "second");
    assert_eq!(ticket.base.updated_at(), event.timestamp);
    assert_eq!(store.aggregate("ticket", "id-1").unwrap().version, 2);

    let replayed: Ticket = runtime.replay("id-1").await.unwrap();
    assert_eq!(replayed, ticket);
    let loaded: Ticket = runtime.load("id-1").await.unwrap().unwrap();
    assert_eq!(loaded, ticket);
}

#[tokio::test]
async fn test_command_for_other_aggregate_type_is_rejected() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = Ticket::default();

    let result = runtime.execute(&Misrouted, &mut ticket, None).await;

    match result {
        Err(DomainError::TypeMismatch { command, aggregate }) => {
            assert_eq!(command, "user");
            assert_eq!(aggregate, "ticket");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_aggregate_with_unknown_id_is_an_invalid_reference() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = Ticket::default();
    ticket.base.id = "ghost".to_owned();

    let result = runtime.execute(&Close, &mut ticket, None).await;

    match result {
        Err(DomainError::InvalidAggregateReference {
            aggregate_type,
            aggregate_id,
        }) => {
            assert_eq!(aggregate_type, "ticket");
            assert_eq!(aggregate_id, "ghost");
        }
        other => panic!("expected InvalidAggregateReference, got {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_failure_persists_nothing() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = Ticket::default();

    let result = runtime
        .execute(&Open { title: "  ".into() }, &mut ticket, None)
        .await;

    assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    assert_eq!(ticket, Ticket::default());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_validation_sees_state_read_under_lock() {
    // Arrange: the caller's copy is stale, the stored ticket is closed.
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = open_ticket(&runtime, "first").await;
    let mut stale = ticket.clone();
    runtime.execute(&Close, &mut ticket, None).await.unwrap();

    // Act
    let result = runtime.execute(&Close, &mut stale, None).await;

    // Assert
    assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    assert_eq!(stale.version(), 2);
    assert!(stale.closed);
}

#[tokio::test]
async fn test_payload_build_failure_is_propagated() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = Ticket::default();

    let result = runtime.execute(&Broken, &mut ticket, None).await;

    assert!(matches!(result, Err(DomainError::CommandFailed(_))));
}

#[tokio::test]
async fn test_event_that_assigns_no_id_fails_the_command() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = Ticket::default();

    let result = runtime
        .execute(
            &Rename {
                title: "orphan".into(),
                expected_version: None,
            },
            &mut ticket,
            None,
        )
        .await;

    match result {
        Err(DomainError::CommandFailed(message)) => assert!(message.contains("ticket.renamed")),
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_create_event_cannot_reassign_an_existing_aggregate() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut ticket = open_ticket(&runtime, "first").await;

    // Act
    let result = runtime
        .execute(&Open { title: "again".into() }, &mut ticket, None)
        .await;

    // Assert
    match result {
        Err(DomainError::CommandFailed(message)) => {
            assert!(message.contains("id-1"));
            assert!(message.contains("id-3"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
    assert_eq!(ticket.id(), "id-1");
    assert_eq!(ticket.version(), 1);
    assert_eq!(store.aggregate("ticket", "id-1").unwrap().version, 1);
    assert!(store.aggregate("ticket", "id-3").is_none());
    assert_eq!(store.events().len(), 1);
    let replayed: Ticket = runtime.replay("id-1").await.unwrap();
    assert_eq!(replayed, ticket);
}

#[tokio::test]
async fn test_unserializable_payload_rolls_back_aggregate_write() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    let mut ticket = open_ticket(&runtime, "first").await;

    // Act
    let result = runtime.execute(&Label, &mut ticket, None).await;

    // Assert
    assert!(matches!(result, Err(DomainError::SerializationFailed(_))));
    assert_eq!(store.aggregate("ticket", "id-1").unwrap().version, 1);
    assert_eq!(store.events().len(), 1);
    assert_eq!(ticket.version(), 1);
}

#[tokio::test]
async fn test_event_insert_failure_rolls_back_aggregate_write() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).build();
    store.fail_at(FailurePoint::InsertEvent);
    let mut ticket = Ticket::default();

    let result = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, None)
        .await;

    assert!(matches!(
        result,
        Err(DomainError::PersistenceFailed(StoreError::Backend(_)))
    ));
    assert!(store.aggregate("ticket", "id-1").is_none());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_commit_failure_restores_caller_aggregate() {
    // Arrange
    let store = InMemoryStore::new();
    let (reactor, mut received) = ChannelAsyncReactor::new();
    let runtime = builder(&store)
        .on(EventMatcher::Any, vec![], vec![Arc::new(reactor)])
        .build();
    store.fail_at(FailurePoint::Commit);
    let mut ticket = Ticket::default();

    // Act
    let result = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, None)
        .await;

    // Assert
    assert!(matches!(result, Err(DomainError::CommitFailed(_))));
    assert_eq!(ticket, Ticket::default());
    assert!(store.events().is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(received.try_recv().is_err());
}

#[tokio::test]
async fn test_failing_sync_reactor_aborts_the_whole_command() {
    // Arrange
    let store = InMemoryStore::new();
    let (async_reactor, mut received) = ChannelAsyncReactor::new();
    let runtime = builder(&store)
        .on(
            EventMatcher::aggregate::<Ticket>(),
            vec![
                Arc::new(RecordingSyncReactor::new("projection")),
                Arc::new(FailingSyncReactor),
            ],
            vec![Arc::new(async_reactor)],
        )
        .build();
    let mut ticket = Ticket::default();

    // Act
    let result = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, None)
        .await;

    // Assert
    match result {
        Err(DomainError::ReactorFailed { reactor, source }) => {
            assert_eq!(reactor, "failing");
            assert!(matches!(*source, DomainError::ValidationFailed(_)));
        }
        other => panic!("expected ReactorFailed, got {other:?}"),
    }
    assert!(store.aggregate("ticket", "id-1").is_none());
    assert!(store.events().is_empty());
    assert!(store.projection("projection:id-2").is_none());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(received.try_recv().is_err());
}

#[tokio::test]
async fn test_sync_reactor_writes_commit_with_the_event() {
    let store = InMemoryStore::new();
    let recorder = Arc::new(RecordingSyncReactor::new("projection"));
    let runtime = builder(&store)
        .on(
            EventMatcher::event(TicketEvent::OPENED),
            vec![recorder.clone()],
            vec![],
        )
        .build();

    let ticket = open_ticket(&runtime, "first").await;

    assert_eq!(ticket.version(), 1);
    assert_eq!(recorder.seen(), vec!["ticket.opened.1".to_owned()]);
    assert_eq!(
        store.projection("projection:id-2"),
        Some(serde_json::json!("ticket.opened"))
    );
}

#[tokio::test]
async fn test_async_reactor_runs_after_commit() {
    // Arrange
    let store = InMemoryStore::new();
    let (reactor, mut received) = ChannelAsyncReactor::new();
    let runtime = builder(&store)
        .on(EventMatcher::Any, vec![], vec![Arc::new(reactor)])
        .build();
    let mut ticket = Ticket::default();

    // Act
    let event = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, None)
        .await
        .unwrap();

    // Assert
    let delivered = tokio::time::timeout(Duration::from_secs(1), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivered, event.id);
}

#[tokio::test]
async fn test_async_reactor_is_discarded_on_rollback() {
    // Arrange
    let store = InMemoryStore::new();
    let (reactor, mut received) = ChannelAsyncReactor::new();
    let runtime = builder(&store)
        .on(EventMatcher::Any, vec![], vec![Arc::new(reactor)])
        .build();
    let mut scope = runtime.begin().await.unwrap();
    let mut ticket = Ticket::default();

    // Act
    runtime
        .execute_tx(&mut scope, &Open { title: "first".into() }, &mut ticket, None)
        .await
        .unwrap();
    scope.rollback().await.unwrap();

    // Assert
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(received.try_recv().is_err());
    assert!(store.events().is_empty());
}

#[tokio::test]
async fn test_execute_tx_composes_commands_in_one_transaction() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut scope = runtime.begin().await.unwrap();
    let mut ticket = Ticket::default();

    // Act
    runtime
        .execute_tx(&mut scope, &Open { title: "first".into() }, &mut ticket, None)
        .await
        .unwrap();
    runtime
        .execute_tx(
            &mut scope,
            &Rename {
                title: "second".into(),
                expected_version: Some(1),
            },
            &mut ticket,
            None,
        )
        .await
        .unwrap();
    assert!(store.events().is_empty());
    scope.commit().await.unwrap();

    // Assert
    assert_eq!(ticket.version(), 2);
    assert_eq!(store.events().len(), 2);
    assert_eq!(store.aggregate("ticket", "id-1").unwrap().version, 2);
}

#[tokio::test]
async fn test_non_persisted_data_is_returned_but_never_stored() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut ticket = Ticket::default();

    let event = runtime
        .execute(
            &OpenWithSecret {
                title: "first".into(),
                secret: "s3cr3t".into(),
            },
            &mut ticket,
            None,
        )
        .await
        .unwrap();

    assert_eq!(
        event.non_persisted,
        Some(serde_json::json!({ "secret": "s3cr3t" }))
    );
    let stored = &store.events()[0];
    assert!(!stored.data.to_string().contains("s3cr3t"));
    assert!(!stored.metadata.to_string().contains("s3cr3t"));
    let decoded = runtime.events::<Ticket>("id-1").await.unwrap();
    assert_eq!(decoded[0].non_persisted, None);
}

#[tokio::test]
async fn test_metadata_is_stored_and_decoded() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();
    let mut metadata = Metadata::new();
    metadata.insert("actor".into(), serde_json::json!("alice"));
    let mut ticket = Ticket::default();

    let event = runtime
        .execute(&Open { title: "first".into() }, &mut ticket, Some(metadata.clone()))
        .await
        .unwrap();

    assert_eq!(event.metadata, metadata);
    assert_eq!(store.events()[0].metadata, serde_json::json!({ "actor": "alice" }));
    let decoded = runtime.events::<Ticket>("id-1").await.unwrap();
    assert_eq!(decoded[0].metadata, metadata);
}

#[tokio::test]
async fn test_concurrent_updates_serialize_on_the_row_lock() {
    // Arrange
    let store = InMemoryStore::new();
    let runtime = Arc::new(builder(&store).build());
    let ticket = open_ticket(&runtime, "first").await;

    // Act
    let mut handles = Vec::new();
    for title in ["left", "right"] {
        let runtime = Arc::clone(&runtime);
        let mut copy = ticket.clone();
        handles.push(tokio::spawn(async move {
            let command = Rename {
                title: title.to_owned(),
                expected_version: Some(1),
            };
            runtime.execute(&command, &mut copy, None).await
        }));
    }
    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(DomainError::ValidationFailed(_)) => rejected += 1,
            Err(other) => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    // Assert
    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(store.aggregate("ticket", "id-1").unwrap().version, 2);
    assert_eq!(store.events().len(), 2);
}

#[tokio::test]
async fn test_replay_of_unknown_aggregate_is_not_found() {
    let store = InMemoryStore::new();
    let runtime = builder(&store).register::<TicketEvent>().build();

    let result = runtime.replay::<Ticket>("nobody").await;

    assert!(matches!(result, Err(DomainError::AggregateNotFound { .. })));
    assert!(runtime.load::<Ticket>("nobody").await.unwrap().is_none());
}
