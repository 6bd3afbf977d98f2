//! Domain error types.

use thiserror::Error;

use crate::store::StoreError;

/// Top-level error type of the runtime.
///
/// Any of these raised inside `execute_tx` leaves the enclosing transaction
/// to be rolled back in full.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The aggregate carries an id that has no persisted row to lock.
    #[error("invalid aggregate reference: {aggregate_type} {aggregate_id} has no persisted row")]
    InvalidAggregateReference {
        /// The routing name of the aggregate.
        aggregate_type: String,
        /// The id the aggregate claimed.
        aggregate_id: String,
    },

    /// Command, aggregate or payload disagree on the aggregate type.
    #[error("command aggregate type ({command}) and aggregate type ({aggregate}) mismatch")]
    TypeMismatch {
        /// The aggregate type named by the command or payload.
        command: String,
        /// The aggregate type of the target aggregate.
        aggregate: String,
    },

    /// Command validation rejected the command.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The command could not build its event payload.
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// Event data, metadata or aggregate state could not be serialized.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[source] serde_json::Error),

    /// A stored blob could not be deserialized into its registered shape.
    #[error("deserialization failed for {what}: {source}")]
    DeserializationFailed {
        /// What was being decoded (type key or aggregate type).
        what: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// No payload shape is registered for the event type key.
    #[error("event type not registered: {0}")]
    UnregisteredEventType(String),

    /// A store read or write failed inside the transaction.
    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),

    /// A synchronous reactor vetoed the event.
    #[error("reactor {reactor} failed: {source}")]
    ReactorFailed {
        /// The reactor's name.
        reactor: String,
        /// The error the reactor returned.
        #[source]
        source: Box<DomainError>,
    },

    /// The transaction could not be committed.
    #[error("commit failed: {0}")]
    CommitFailed(#[source] StoreError),

    /// No persisted aggregate exists for the id.
    #[error("aggregate not found: {aggregate_type} {aggregate_id}")]
    AggregateNotFound {
        /// The routing name of the aggregate.
        aggregate_type: String,
        /// The requested id.
        aggregate_id: String,
    },
}
