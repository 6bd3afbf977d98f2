//! Query handlers for the Todo context.
//!
//! Views are built from the persisted aggregate row; history is decoded
//! from the event store.

use chrono::{DateTime, Utc};
use eventide_core::{Aggregate, DomainError, Runtime};
use serde::Serialize;

use crate::domain::aggregates::Todo;
use crate::domain::events::TodoEvent;

/// Read-only view of a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoView {
    /// The todo identifier.
    pub todo_id: String,
    /// Current text.
    pub text: String,
    /// Name of the author.
    pub author_name: String,
    /// Current version (event count).
    pub version: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last change.
    pub updated_at: DateTime<Utc>,
}

impl From<Todo> for TodoView {
    fn from(todo: Todo) -> Self {
        Self {
            version: todo.version(),
            updated_at: todo.base.updated_at(),
            created_at: todo.base.created_at,
            todo_id: todo.base.id,
            text: todo.text,
            author_name: todo.author.name,
        }
    }
}

/// One entry of a todo's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoHistoryEntry {
    /// The event identifier.
    pub event_id: String,
    /// `todo.created` or `todo.text_updated`.
    pub event_type: String,
    /// Payload schema version.
    pub schema_version: u64,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
    /// The text after this event.
    pub text: String,
}

/// Retrieves a todo by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no todo has this id.
pub async fn get_todo_by_id(runtime: &Runtime, todo_id: &str) -> Result<TodoView, DomainError> {
    runtime
        .load::<Todo>(todo_id)
        .await?
        .map(TodoView::from)
        .ok_or_else(|| DomainError::AggregateNotFound {
            aggregate_type: Todo::AGGREGATE_TYPE.to_owned(),
            aggregate_id: todo_id.to_owned(),
        })
}

/// Lists the text revisions of a todo, oldest first.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the todo has no history, and
/// decode errors for events that are not registered.
pub async fn get_todo_history(
    runtime: &Runtime,
    todo_id: &str,
) -> Result<Vec<TodoHistoryEntry>, DomainError> {
    let events = runtime.events::<Todo>(todo_id).await?;
    if events.is_empty() {
        return Err(DomainError::AggregateNotFound {
            aggregate_type: Todo::AGGREGATE_TYPE.to_owned(),
            aggregate_id: todo_id.to_owned(),
        });
    }
    Ok(events
        .into_iter()
        .map(|event| {
            let text = match event.data {
                TodoEvent::Created(created) => created.text,
                TodoEvent::TextUpdated(updated) => updated.text,
            };
            TodoHistoryEntry {
                event_id: event.id,
                event_type: event.event_type,
                schema_version: event.schema_version,
                occurred_at: event.timestamp,
                text,
            }
        })
        .collect())
}
