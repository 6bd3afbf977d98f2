//! Command handlers for the Todo context.
//!
//! Each handler resolves the target aggregate, runs the command through the
//! runtime and returns the new state with the event it produced.

use eventide_core::{Aggregate, DomainError, Event, Metadata, Runtime};

use crate::application::projections::ACTOR_KEY;
use crate::domain::aggregates::Todo;
use crate::domain::commands::{Create, UpdateText};
use crate::domain::events::TodoEvent;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct TodoCommandResult {
    /// State after the command.
    pub todo: Todo,
    /// The event produced and persisted.
    pub event: Event<TodoEvent>,
}

fn actor_metadata(actor: Option<&str>) -> Option<Metadata> {
    actor.map(|actor| {
        let mut metadata = Metadata::new();
        metadata.insert(ACTOR_KEY.to_owned(), serde_json::Value::from(actor));
        metadata
    })
}

/// Handles the `Create` command.
///
/// # Errors
///
/// Returns `DomainError::ValidationFailed` for blank text or author, and any
/// pipeline error.
pub async fn handle_create(
    runtime: &Runtime,
    command: &Create,
    actor: Option<&str>,
) -> Result<TodoCommandResult, DomainError> {
    let mut todo = Todo::default();
    let event = runtime
        .execute(command, &mut todo, actor_metadata(actor))
        .await?;
    Ok(TodoCommandResult { todo, event })
}

/// Handles the `UpdateText` command: loads the todo, then updates it under
/// its row lock.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no todo has this id, and any
/// pipeline error.
pub async fn handle_update_text(
    runtime: &Runtime,
    todo_id: &str,
    command: &UpdateText,
    actor: Option<&str>,
) -> Result<TodoCommandResult, DomainError> {
    let mut todo = runtime
        .load::<Todo>(todo_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound {
            aggregate_type: Todo::AGGREGATE_TYPE.to_owned(),
            aggregate_id: todo_id.to_owned(),
        })?;
    let event = runtime
        .execute(command, &mut todo, actor_metadata(actor))
        .await?;
    Ok(TodoCommandResult { todo, event })
}
