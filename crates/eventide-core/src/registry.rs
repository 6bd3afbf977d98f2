//! Event type registry.
//!
//! Maps each `aggregate_type.action.schema_version` key to the payload family
//! that can decode it. Populated once through the runtime builder and
//! read-only afterwards.

use std::any::type_name;
use std::collections::HashMap;

use crate::event::{Event, EventData, EventKind, Metadata};
use crate::error::DomainError;
use crate::store::EventStoreRecord;

#[derive(Debug, Clone)]
struct RegisteredType {
    kind: EventKind,
    payload: &'static str,
}

/// Registry of decodable event payload shapes.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    types: HashMap<String, RegisteredType>,
}

impl EventRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every kind of the payload family `D`.
    pub fn register<D: EventData>(&mut self) {
        for kind in D::KINDS {
            self.register_event_type::<D>(*kind);
        }
    }

    /// Registers one kind as decodable by the payload family `D`.
    /// Registering the same pair again is a no-op.
    pub fn register_event_type<D: EventData>(&mut self, kind: EventKind) {
        let payload = type_name::<D>();
        if !D::KINDS.contains(&kind) {
            tracing::warn!(%kind, payload, "registering a kind the payload family does not list");
        }
        let previous = self
            .types
            .insert(kind.type_key(), RegisteredType { kind, payload });
        if let Some(previous) = previous.filter(|previous| previous.payload != payload) {
            tracing::warn!(
                %kind,
                previous = previous.payload,
                payload,
                "event type re-registered with a different payload family"
            );
        }
    }

    /// Returns whether a payload shape is registered for the key.
    #[must_use]
    pub fn is_registered(&self, type_key: &str) -> bool {
        self.types.contains_key(type_key)
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Decodes a durable record into a typed event.
    ///
    /// The payload shape is found through the record's type key; the result
    /// never carries non-persisted data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnregisteredEventType` if the key is not
    /// registered for `D`, and `DomainError::DeserializationFailed` if either
    /// blob is malformed.
    pub fn decode<D: EventData>(&self, record: &EventStoreRecord) -> Result<Event<D>, DomainError> {
        let type_key = record.type_key();
        let registered = self
            .types
            .get(&type_key)
            .filter(|registered| registered.payload == type_name::<D>())
            .ok_or_else(|| DomainError::UnregisteredEventType(type_key.clone()))?;

        let data = D::from_data(registered.kind, record.data.clone()).map_err(|source| {
            DomainError::DeserializationFailed {
                what: type_key.clone(),
                source,
            }
        })?;
        let metadata: Metadata = serde_json::from_value(record.metadata.clone()).map_err(|source| {
            DomainError::DeserializationFailed {
                what: format!("{type_key} metadata"),
                source,
            }
        })?;

        Ok(Event {
            id: record.id.clone(),
            timestamp: record.timestamp,
            aggregate_id: record.aggregate_id.clone(),
            aggregate_type: record.aggregate_type.clone(),
            action: record.action.clone(),
            schema_version: record.schema_version,
            event_type: record.event_type.clone(),
            data,
            metadata,
            non_persisted: None,
        })
    }
}
