//! Test reactors — recording, failing and channel-backed reactors.

use std::sync::Mutex;

use async_trait::async_trait;
use eventide_core::error::DomainError;
use eventide_core::event::DomainEvent;
use eventide_core::reactor::{AsyncReactor, SyncReactor};
use eventide_core::store::Transaction;
use tokio::sync::mpsc;

use crate::store::InMemoryTransaction;

/// A synchronous reactor that records the type key of every event it sees,
/// and stages a projection `"{label}:{event_id}"` when running on an
/// [`InMemoryTransaction`].
#[derive(Debug)]
pub struct RecordingSyncReactor {
    label: String,
    seen: Mutex<Vec<String>>,
}

impl RecordingSyncReactor {
    /// Create a reactor identified by `label`.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns the `aggregate_type.action.schema_version` keys seen so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncReactor for RecordingSyncReactor {
    fn name(&self) -> &str {
        &self.label
    }

    async fn react(&self, tx: &mut dyn Transaction, event: &dyn DomainEvent) -> Result<(), DomainError> {
        self.seen.lock().unwrap().push(format!(
            "{}.{}.{}",
            event.aggregate_type(),
            event.action(),
            event.schema_version()
        ));
        if let Some(tx) = tx.downcast_mut::<InMemoryTransaction>() {
            tx.put_projection(
                format!("{}:{}", self.label, event.event_id()),
                serde_json::json!(event.event_type()),
            );
        }
        Ok(())
    }
}

/// A synchronous reactor that always vetoes the event.
#[derive(Debug)]
pub struct FailingSyncReactor;

#[async_trait]
impl SyncReactor for FailingSyncReactor {
    fn name(&self) -> &str {
        "failing"
    }

    async fn react(&self, _tx: &mut dyn Transaction, _event: &dyn DomainEvent) -> Result<(), DomainError> {
        Err(DomainError::ValidationFailed("reactor refused the event".into()))
    }
}

/// An asynchronous reactor that forwards each event id to a channel, so
/// tests can await delivery.
#[derive(Debug)]
pub struct ChannelAsyncReactor {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelAsyncReactor {
    /// Create the reactor and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AsyncReactor for ChannelAsyncReactor {
    async fn react(&self, event: &dyn DomainEvent) {
        // The receiver may be gone once a test finished.
        let _ = self.sender.send(event.event_id().to_owned());
    }
}
