//! Reactors for the Todo context.
//!
//! `ActivityFeed` is an eventually consistent read model fed after commit.
//! `RevisionLimit` runs inside the command's transaction and vetoes edits
//! past a fixed history length.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventide_core::{Aggregate, AsyncReactor, DomainError, DomainEvent, SyncReactor, Transaction};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::domain::aggregates::Todo;

/// Metadata key naming who issued a command.
pub const ACTOR_KEY: &str = "actor";

/// One line of the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    /// The todo the event belongs to.
    pub todo_id: String,
    /// `todo.created`, `todo.text_updated`, ...
    pub event_type: String,
    /// The actor recorded in the event metadata, if any.
    pub actor: Option<String>,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

/// Number of entries [`ActivityFeed::new`] keeps.
pub const DEFAULT_FEED_CAPACITY: usize = 1_000;

/// Recent todo activity, newest last. Holds at most `capacity` entries; the
/// oldest are dropped first.
#[derive(Debug)]
pub struct ActivityFeed {
    capacity: usize,
    entries: RwLock<VecDeque<ActivityEntry>>,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }
}

impl ActivityFeed {
    /// Creates an empty feed keeping [`DEFAULT_FEED_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty feed keeping the latest `capacity` entries, at
    /// least one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Returns a snapshot of the feed.
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Returns the entries of one todo.
    pub async fn entries_for(&self, todo_id: &str) -> Vec<ActivityEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.todo_id == todo_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AsyncReactor for ActivityFeed {
    fn name(&self) -> &str {
        "todo.activity_feed"
    }

    async fn react(&self, event: &dyn DomainEvent) {
        let entry = ActivityEntry {
            todo_id: event.aggregate_id().to_owned(),
            event_type: event.event_type().to_owned(),
            actor: event
                .metadata()
                .get(ACTOR_KEY)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            occurred_at: event.timestamp(),
        };
        tracing::debug!(todo_id = %entry.todo_id, event_type = %entry.event_type, "activity recorded");
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// Rejects any event that would take a todo's history past `max_events`.
#[derive(Debug, Clone, Copy)]
pub struct RevisionLimit {
    max_events: usize,
}

impl RevisionLimit {
    /// Allows at most `max_events` events per todo, creation included.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self { max_events }
    }
}

#[async_trait]
impl SyncReactor for RevisionLimit {
    fn name(&self) -> &str {
        "todo.revision_limit"
    }

    async fn react(&self, tx: &mut dyn Transaction, event: &dyn DomainEvent) -> Result<(), DomainError> {
        // The history read here already contains `event`.
        let history = tx
            .query_events_for_aggregate(Todo::AGGREGATE_TYPE, event.aggregate_id())
            .await?;
        if history.len() > self.max_events {
            return Err(DomainError::ValidationFailed(format!(
                "todo {} cannot take more than {} revisions",
                event.aggregate_id(),
                self.max_events
            )));
        }
        Ok(())
    }
}
