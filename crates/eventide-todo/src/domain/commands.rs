//! Commands for the Todo context.

use async_trait::async_trait;
use eventide_core::id::IdGenerator;
use eventide_core::{Aggregate, Command, DomainError, Payload, Transaction};

use super::aggregates::Todo;
use super::events::{CreatedV1, TextUpdatedV1, TodoEvent};

/// Longest accepted todo text, in characters.
pub const MAX_TEXT_CHARS: usize = 500;

fn validate_text(text: &str) -> Result<(), DomainError> {
    if text.trim().is_empty() {
        return Err(DomainError::ValidationFailed("todo text must not be empty".into()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(DomainError::ValidationFailed(format!(
            "todo text is longer than {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(())
}

/// Command to create a todo. The id is generated when the event is built.
#[derive(Debug, Clone)]
pub struct Create {
    /// Initial text.
    pub text: String,
    /// Name of the author.
    pub author_name: String,
}

#[async_trait]
impl Command for Create {
    type Aggregate = Todo;

    fn command_type(&self) -> &'static str {
        "todo.create"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, todo: &Todo) -> Result<(), DomainError> {
        if !todo.id().is_empty() {
            return Err(DomainError::ValidationFailed(format!("todo {} already exists", todo.id())));
        }
        validate_text(&self.text)?;
        if self.author_name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("author name must not be empty".into()));
        }
        Ok(())
    }

    fn build_payload(&self, ids: &dyn IdGenerator) -> Result<Payload<TodoEvent>, DomainError> {
        Ok(Payload::new(TodoEvent::Created(CreatedV1 {
            id: ids.next_id(),
            text: self.text.clone(),
            author_name: self.author_name.clone(),
        })))
    }
}

/// Command to replace the text of an existing todo.
#[derive(Debug, Clone)]
pub struct UpdateText {
    /// The new text.
    pub text: String,
    /// When set, the command is rejected unless the todo is at this version.
    pub expected_version: Option<u64>,
}

#[async_trait]
impl Command for UpdateText {
    type Aggregate = Todo;

    fn command_type(&self) -> &'static str {
        "todo.update_text"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, todo: &Todo) -> Result<(), DomainError> {
        if todo.id().is_empty() {
            return Err(DomainError::ValidationFailed("todo has not been created".into()));
        }
        if let Some(expected) = self
            .expected_version
            .filter(|expected| *expected != todo.version())
        {
            return Err(DomainError::ValidationFailed(format!(
                "todo {} is at version {}, expected {expected}",
                todo.id(),
                todo.version()
            )));
        }
        validate_text(&self.text)
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<TodoEvent>, DomainError> {
        Ok(Payload::new(TodoEvent::TextUpdated(TextUpdatedV1 {
            text: self.text.clone(),
        })))
    }
}
