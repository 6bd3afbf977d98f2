//! Shared test domain for the core integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use eventide_core::event::unknown_kind;
use eventide_core::id::IdGenerator;
use eventide_core::{
    Aggregate, AggregateBase, Command, DomainError, Event, EventData, EventKind, Payload,
    RuntimeBuilder, Transaction,
};
use eventide_test_support::{InMemoryStore, SequenceIds, SteppingClock};
use serde::{Deserialize, Serialize};

/// Timestamp of the first event produced by a test runtime.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Builder over `store` with a stepping clock and `id-N` identifiers.
pub fn builder(store: &InMemoryStore) -> RuntimeBuilder {
    RuntimeBuilder::new(Arc::new(store.clone()))
        .with_clock(Arc::new(SteppingClock::new(fixed_now())))
        .with_id_generator(Arc::new(SequenceIds::new("id")))
}

// --- aggregate ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(flatten)]
    pub base: AggregateBase,
    pub title: String,
    pub closed: bool,
}

impl Aggregate for Ticket {
    const AGGREGATE_TYPE: &'static str = "ticket";
    type Event = TicketEvent;

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn apply(&mut self, event: &Event<TicketEvent>) {
        match &event.data {
            TicketEvent::Opened(payload) => {
                self.base.id.clone_from(&payload.id);
                self.base.created_at = event.timestamp;
                self.title.clone_from(&payload.title);
            }
            TicketEvent::Renamed(payload) => self.title.clone_from(&payload.title),
            TicketEvent::Closed(_) => self.closed = true,
            TicketEvent::Labelled(_) => {}
        }
    }
}

// --- events ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenedV1 {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenamedV1 {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedV1 {}

/// Byte-string keys cannot be JSON object keys, so this never encodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledV1 {
    pub labels: BTreeMap<Vec<u8>, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TicketEvent {
    Opened(OpenedV1),
    Renamed(RenamedV1),
    Closed(ClosedV1),
    Labelled(LabelledV1),
}

impl TicketEvent {
    pub const OPENED: EventKind = EventKind::new("ticket", "opened", 1);
    pub const RENAMED: EventKind = EventKind::new("ticket", "renamed", 1);
    pub const CLOSED: EventKind = EventKind::new("ticket", "closed", 1);
    pub const LABELLED: EventKind = EventKind::new("ticket", "labelled", 1);
}

impl EventData for TicketEvent {
    const KINDS: &'static [EventKind] = &[
        Self::OPENED,
        Self::RENAMED,
        Self::CLOSED,
        Self::LABELLED,
    ];

    fn kind(&self) -> EventKind {
        match self {
            Self::Opened(_) => Self::OPENED,
            Self::Renamed(_) => Self::RENAMED,
            Self::Closed(_) => Self::CLOSED,
            Self::Labelled(_) => Self::LABELLED,
        }
    }

    fn to_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Opened(payload) => serde_json::to_value(payload),
            Self::Renamed(payload) => serde_json::to_value(payload),
            Self::Closed(payload) => serde_json::to_value(payload),
            Self::Labelled(payload) => serde_json::to_value(payload),
        }
    }

    fn from_data(kind: EventKind, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        match (kind.action, kind.schema_version) {
            ("opened", 1) => serde_json::from_value(data).map(Self::Opened),
            ("renamed", 1) => serde_json::from_value(data).map(Self::Renamed),
            ("closed", 1) => serde_json::from_value(data).map(Self::Closed),
            ("labelled", 1) => serde_json::from_value(data).map(Self::Labelled),
            _ => Err(unknown_kind(kind)),
        }
    }
}

// --- commands ---

#[derive(Debug)]
pub struct Open {
    pub title: String,
}

#[async_trait]
impl Command for Open {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.open"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, _ticket: &Ticket) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::ValidationFailed("title must not be empty".into()));
        }
        Ok(())
    }

    fn build_payload(&self, ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Ok(Payload::new(TicketEvent::Opened(OpenedV1 {
            id: ids.next_id(),
            title: self.title.clone(),
        })))
    }
}

/// Opens a ticket and hands a secret back through the non-persisted slot.
#[derive(Debug)]
pub struct OpenWithSecret {
    pub title: String,
    pub secret: String,
}

#[async_trait]
impl Command for OpenWithSecret {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.open_with_secret"
    }

    fn build_payload(&self, ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Ok(Payload::new(TicketEvent::Opened(OpenedV1 {
            id: ids.next_id(),
            title: self.title.clone(),
        }))
        .with_non_persisted(serde_json::json!({ "secret": self.secret })))
    }
}

/// Renames a ticket; rejects when `expected_version` is set and stale.
#[derive(Debug)]
pub struct Rename {
    pub title: String,
    pub expected_version: Option<u64>,
}

#[async_trait]
impl Command for Rename {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.rename"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, ticket: &Ticket) -> Result<(), DomainError> {
        match self.expected_version {
            Some(expected) if expected != ticket.version() => Err(DomainError::ValidationFailed(
                format!("expected version {expected}, found {}", ticket.version()),
            )),
            _ => Ok(()),
        }
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Ok(Payload::new(TicketEvent::Renamed(RenamedV1 {
            title: self.title.clone(),
        })))
    }
}

#[derive(Debug)]
pub struct Close;

#[async_trait]
impl Command for Close {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.close"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, ticket: &Ticket) -> Result<(), DomainError> {
        if ticket.closed {
            return Err(DomainError::ValidationFailed("ticket already closed".into()));
        }
        Ok(())
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Ok(Payload::new(TicketEvent::Closed(ClosedV1 {})))
    }
}

/// Produces a payload that cannot be serialized.
#[derive(Debug)]
pub struct Label;

#[async_trait]
impl Command for Label {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.label"
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        let mut labels = BTreeMap::new();
        labels.insert(vec![1, 2], "binary".to_owned());
        Ok(Payload::new(TicketEvent::Labelled(LabelledV1 { labels })))
    }
}

/// Claims to target users while operating on tickets.
#[derive(Debug)]
pub struct Misrouted;

#[async_trait]
impl Command for Misrouted {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.misrouted"
    }

    fn aggregate_type(&self) -> &'static str {
        "user"
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Ok(Payload::new(TicketEvent::Closed(ClosedV1 {})))
    }
}

/// Fails while building its payload.
#[derive(Debug)]
pub struct Broken;

#[async_trait]
impl Command for Broken {
    type Aggregate = Ticket;

    fn command_type(&self) -> &'static str {
        "ticket.broken"
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TicketEvent>, DomainError> {
        Err(DomainError::CommandFailed("payload unavailable".into()))
    }
}
