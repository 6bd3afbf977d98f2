//! Aggregate root for the Todo context.

use eventide_core::{Aggregate, AggregateBase, Event};
use serde::{Deserialize, Serialize};

use super::events::TodoEvent;

/// Author of a todo, stored inline with the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
}

/// A todo item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Identity, timestamps and version.
    #[serde(flatten)]
    pub base: AggregateBase,
    /// Current text.
    pub text: String,
    /// Who created the todo.
    pub author: Author,
}

impl Aggregate for Todo {
    const AGGREGATE_TYPE: &'static str = "todo";
    type Event = TodoEvent;

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn apply(&mut self, event: &Event<TodoEvent>) {
        match &event.data {
            TodoEvent::Created(created) => {
                self.base.id.clone_from(&created.id);
                self.base.created_at = event.timestamp;
                self.text.clone_from(&created.text);
                self.author = Author {
                    name: created.author_name.clone(),
                };
            }
            TodoEvent::TextUpdated(updated) => {
                self.text.clone_from(&updated.text);
            }
        }
    }
}
