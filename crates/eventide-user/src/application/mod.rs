//! Application layer for the User context.

pub mod command_handlers;
pub mod notifications;
pub mod query_handlers;

use std::sync::Arc;

use eventide_core::{EventMatcher, RuntimeBuilder};

use crate::domain::events::{USER_FIRST_NAME_UPDATED, UserEvent};
use notifications::NameChangeNotifier;

/// Registers every User event type, both `user.created` versions included,
/// and subscribes `notifier` to committed first-name changes.
#[must_use]
pub fn install(builder: RuntimeBuilder, notifier: NameChangeNotifier) -> RuntimeBuilder {
    builder
        .register::<UserEvent>()
        .on(
            EventMatcher::event(USER_FIRST_NAME_UPDATED),
            vec![],
            vec![Arc::new(notifier)],
        )
}
