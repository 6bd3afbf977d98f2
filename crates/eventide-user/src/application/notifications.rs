//! Post-commit notification of first-name changes.

use async_trait::async_trait;
use eventide_core::{AsyncReactor, DomainEvent};
use tokio::sync::mpsc;

use crate::domain::events::UserEvent;

/// A committed first-name change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChange {
    /// The renamed user.
    pub user_id: String,
    /// The new first name.
    pub first_name: String,
}

/// Forwards every committed first-name change to a channel.
#[derive(Debug)]
pub struct NameChangeNotifier {
    sender: mpsc::UnboundedSender<NameChange>,
}

impl NameChangeNotifier {
    /// Creates the notifier and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NameChange>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AsyncReactor for NameChangeNotifier {
    fn name(&self) -> &str {
        "user.name_change_notifier"
    }

    async fn react(&self, event: &dyn DomainEvent) {
        let Some(event) = event.downcast_ref::<UserEvent>() else {
            return;
        };
        let UserEvent::FirstNameUpdated(updated) = &event.data else {
            return;
        };
        let change = NameChange {
            user_id: event.aggregate_id.clone(),
            first_name: updated.first_name.clone(),
        };
        if self.sender.send(change).is_err() {
            tracing::warn!(user_id = %event.aggregate_id, "name change receiver dropped");
        }
    }
}
