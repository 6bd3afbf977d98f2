//! Domain events for the Todo aggregate.

use eventide_core::event::unknown_kind;
use eventide_core::{EventData, EventKind};
use serde::{Deserialize, Serialize};

/// Kind of [`CreatedV1`].
pub const TODO_CREATED: EventKind = EventKind::new("todo", "created", 1);

/// Kind of [`TextUpdatedV1`].
pub const TODO_TEXT_UPDATED: EventKind = EventKind::new("todo", "text_updated", 1);

/// Emitted when a todo is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedV1 {
    /// The new todo's identifier.
    pub id: String,
    /// Initial text.
    pub text: String,
    /// Name of the author.
    pub author_name: String,
}

/// Emitted when the text of a todo changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUpdatedV1 {
    /// The new text.
    pub text: String,
}

/// Event payload variants for the Todo aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoEvent {
    /// A todo has been created.
    Created(CreatedV1),
    /// A todo's text has been replaced.
    TextUpdated(TextUpdatedV1),
}

impl EventData for TodoEvent {
    const KINDS: &'static [EventKind] = &[TODO_CREATED, TODO_TEXT_UPDATED];

    fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => TODO_CREATED,
            Self::TextUpdated(_) => TODO_TEXT_UPDATED,
        }
    }

    fn to_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Created(data) => serde_json::to_value(data),
            Self::TextUpdated(data) => serde_json::to_value(data),
        }
    }

    fn from_data(kind: EventKind, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        match (kind.action, kind.schema_version) {
            ("created", 1) => serde_json::from_value(data).map(Self::Created),
            ("text_updated", 1) => serde_json::from_value(data).map(Self::TextUpdated),
            _ => Err(unknown_kind(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_stored_without_enum_tag() {
        let event = TodoEvent::Created(CreatedV1 {
            id: "t-1".into(),
            text: "buy milk".into(),
            author_name: "alice".into(),
        });

        let data = event.to_data().unwrap();

        assert_eq!(
            data,
            serde_json::json!({ "id": "t-1", "text": "buy milk", "author_name": "alice" })
        );
        assert_eq!(TodoEvent::from_data(TODO_CREATED, data).unwrap(), event);
    }

    #[test]
    fn test_kinds_have_expected_type_keys() {
        assert_eq!(TODO_CREATED.type_key(), "todo.created.1");
        assert_eq!(TODO_TEXT_UPDATED.type_key(), "todo.text_updated.1");
        assert_eq!(
            TodoEvent::TextUpdated(TextUpdatedV1 { text: "x".into() }).kind(),
            TODO_TEXT_UPDATED
        );
    }
}
