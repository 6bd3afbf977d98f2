//! Command abstractions.

use async_trait::async_trait;

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::id::IdGenerator;
use crate::store::Transaction;

/// Event payload built by a command, plus data that travels with the
/// in-memory event but is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload<D> {
    /// The event payload.
    pub data: D,
    /// Build-time data excluded from the durable record.
    pub non_persisted: Option<serde_json::Value>,
}

impl<D> Payload<D> {
    /// Wraps a payload with no non-persisted data.
    #[must_use]
    pub fn new(data: D) -> Self {
        Self {
            data,
            non_persisted: None,
        }
    }

    /// Attaches data that is handed to the caller and reactors but never
    /// written to the event store.
    #[must_use]
    pub fn with_non_persisted(mut self, value: serde_json::Value) -> Self {
        self.non_persisted = Some(value);
        self
    }
}

/// An intent to change one aggregate; produces exactly one event when it
/// succeeds.
#[async_trait]
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The aggregate this command targets.
    type Aggregate: Aggregate;

    /// The type name for this command (for logging).
    fn command_type(&self) -> &'static str;

    /// Routing name of the aggregate this command is meant for.
    fn aggregate_type(&self) -> &'static str {
        <Self::Aggregate as Aggregate>::AGGREGATE_TYPE
    }

    /// Checks the command against the current aggregate state. Runs inside
    /// the command's transaction, after the aggregate row has been locked.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` (or a store error) to reject
    /// the command.
    async fn validate(
        &self,
        _tx: &mut dyn Transaction,
        _aggregate: &Self::Aggregate,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    /// Builds the event payload. Create-style commands draw the new
    /// aggregate id from `ids`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CommandFailed` if the payload cannot be built.
    fn build_payload(
        &self,
        ids: &dyn IdGenerator,
    ) -> Result<Payload<<Self::Aggregate as Aggregate>::Event>, DomainError>;
}
