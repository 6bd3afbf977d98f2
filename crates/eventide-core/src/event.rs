//! Event model: payload identity, the in-memory event and its durable form.

use std::any::Any;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::command::Payload;
use crate::error::DomainError;
use crate::id::IdGenerator;
use crate::store::EventStoreRecord;

/// Caller-supplied event metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Static identity of one event payload shape.
///
/// The triple `(aggregate_type, action, schema_version)` is the key used to
/// locate a decodable payload shape in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind {
    /// Routing name of the aggregate, e.g. `"todo"`.
    pub aggregate_type: &'static str,
    /// Verb describing the change, e.g. `"created"`.
    pub action: &'static str,
    /// Revision of the payload shape; unrelated to aggregate versions.
    pub schema_version: u64,
}

impl EventKind {
    /// Creates a new event kind.
    #[must_use]
    pub const fn new(aggregate_type: &'static str, action: &'static str, schema_version: u64) -> Self {
        Self {
            aggregate_type,
            action,
            schema_version,
        }
    }

    /// Human-readable event type, `aggregate_type.action`.
    #[must_use]
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.aggregate_type, self.action)
    }

    /// Registry key, `aggregate_type.action.schema_version`.
    #[must_use]
    pub fn type_key(&self) -> String {
        type_key(self.aggregate_type, self.action, self.schema_version)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.aggregate_type, self.action, self.schema_version
        )
    }
}

/// Formats the registry key for a type triple.
#[must_use]
pub fn type_key(aggregate_type: &str, action: &str, schema_version: u64) -> String {
    format!("{aggregate_type}.{action}.{schema_version}")
}

/// Closed set of event payloads belonging to one aggregate.
///
/// Implemented by an enum with one variant per payload shape. Each variant
/// knows its own kind and how to encode itself; `from_data` rebuilds the
/// variant for a kind the registry resolved.
pub trait EventData: Clone + fmt::Debug + Send + Sync + 'static {
    /// Every kind this payload family can carry.
    const KINDS: &'static [EventKind];

    /// Returns the kind of this payload.
    fn kind(&self) -> EventKind;

    /// Serializes the variant's payload, without any enum tag.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload holds values JSON cannot
    /// represent.
    fn to_data(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Deserializes the payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a decode error for malformed data or a kind outside
    /// [`EventData::KINDS`].
    fn from_data(kind: EventKind, data: serde_json::Value) -> Result<Self, serde_json::Error>;
}

/// Builds the error `from_data` returns for a kind its family does not carry.
#[must_use]
pub fn unknown_kind(kind: EventKind) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(format!("unknown event kind {kind}"))
}

/// In-memory event.
///
/// `non_persisted` is payload-adjacent data computed at build time that is
/// never written to the event store, so it is always `None` after decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<D> {
    /// Unique event identifier.
    pub id: String,
    /// UTC creation timestamp.
    pub timestamp: DateTime<Utc>,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Routing name of the aggregate.
    pub aggregate_type: String,
    /// Verb describing the change.
    pub action: String,
    /// Revision of the payload shape.
    pub schema_version: u64,
    /// `aggregate_type.action`; not unique across schema versions.
    pub event_type: String,
    /// The typed payload.
    pub data: D,
    /// Caller-supplied metadata, empty by default.
    pub metadata: Metadata,
    /// Build-time data excluded from the durable record.
    pub non_persisted: Option<serde_json::Value>,
}

impl<D: EventData> Event<D> {
    /// Builds a new event for `payload`, stamping a fresh id and the current
    /// UTC time, and deriving the kind fields from the payload.
    #[must_use]
    pub fn build(
        payload: Payload<D>,
        metadata: Option<Metadata>,
        aggregate_id: &str,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Self {
        let kind = payload.data.kind();
        Self {
            id: ids.next_id(),
            timestamp: clock.now(),
            aggregate_id: aggregate_id.to_owned(),
            aggregate_type: kind.aggregate_type.to_owned(),
            action: kind.action.to_owned(),
            schema_version: kind.schema_version,
            event_type: kind.event_type(),
            data: payload.data,
            metadata: metadata.unwrap_or_default(),
            non_persisted: payload.non_persisted,
        }
    }

    /// Encodes this event into its durable record. Scalar fields are copied
    /// verbatim; data and metadata are serialized independently.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SerializationFailed` if either blob cannot be
    /// serialized.
    pub fn encode(&self) -> Result<EventStoreRecord, DomainError> {
        let data = self
            .data
            .to_data()
            .map_err(DomainError::SerializationFailed)?;
        let metadata = serde_json::to_value(&self.metadata).map_err(DomainError::SerializationFailed)?;

        Ok(EventStoreRecord {
            id: self.id.clone(),
            aggregate_id: self.aggregate_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            action: self.action.clone(),
            schema_version: self.schema_version,
            event_type: self.event_type.clone(),
            timestamp: self.timestamp,
            data,
            metadata,
        })
    }
}

/// Type-erased view of an event, as seen by matchers and reactors.
pub trait DomainEvent: fmt::Debug + Send + Sync + 'static {
    /// Returns the event identifier.
    fn event_id(&self) -> &str;

    /// Returns the creation timestamp.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the aggregate routing name.
    fn aggregate_type(&self) -> &str;

    /// Returns the action verb.
    fn action(&self) -> &str;

    /// Returns the payload schema version.
    fn schema_version(&self) -> u64;

    /// Returns `aggregate_type.action`.
    fn event_type(&self) -> &str;

    /// Returns the event metadata.
    fn metadata(&self) -> &Metadata;

    /// Serializes the payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the payload cannot be represented.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Upcast used by `downcast_ref` for typed payload access.
    fn as_any(&self) -> &dyn Any;
}

impl dyn DomainEvent {
    /// Returns the typed event if its payload family is `D`.
    #[must_use]
    pub fn downcast_ref<D: EventData>(&self) -> Option<&Event<D>> {
        self.as_any().downcast_ref::<Event<D>>()
    }
}

impl<D: EventData> DomainEvent for Event<D> {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    fn action(&self) -> &str {
        &self.action
    }

    fn schema_version(&self) -> u64 {
        self.schema_version
    }

    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        self.data.to_data()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
