//! Application layer for the Todo context.

pub mod command_handlers;
pub mod projections;
pub mod query_handlers;

use std::sync::Arc;

use eventide_core::{EventMatcher, RuntimeBuilder};

use crate::domain::aggregates::Todo;
use crate::domain::events::{TODO_TEXT_UPDATED, TodoEvent};
use projections::{ActivityFeed, RevisionLimit};

/// Registers the Todo event types, caps each todo at `max_revisions`
/// events and feeds `feed` after every committed todo event.
#[must_use]
pub fn install(builder: RuntimeBuilder, feed: Arc<ActivityFeed>, max_revisions: usize) -> RuntimeBuilder {
    builder
        .register::<TodoEvent>()
        .on(
            EventMatcher::event(TODO_TEXT_UPDATED),
            vec![Arc::new(RevisionLimit::new(max_revisions))],
            vec![],
        )
        .on(EventMatcher::aggregate::<Todo>(), vec![], vec![feed])
}
