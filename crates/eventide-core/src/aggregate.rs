//! Aggregate abstraction.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventData};

/// State shared by every aggregate: identity, timestamps and version.
///
/// `version` and `updated_at` are owned by the command pipeline; domain code
/// can read them but only the pipeline can advance them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateBase {
    /// Aggregate identifier; empty until a create-style event assigns one.
    pub id: String,
    /// Timestamp of the creating event.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last applied event.
    updated_at: DateTime<Utc>,
    /// Soft-delete marker. Not enforced by the runtime.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Number of events applied, in order.
    version: u64,
}

impl AggregateBase {
    /// Returns the number of events applied to this aggregate.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the timestamp of the last applied event.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn increment_version(&mut self) {
        self.version += 1;
    }

    pub(crate) fn set_updated_at(&mut self, timestamp: DateTime<Utc>) {
        self.updated_at = timestamp;
    }
}

/// Trait for aggregates whose state is rebuilt from their event history.
///
/// `Default` is the "not yet created" state (empty id, version 0); both
/// creation commands and replay start from it.
pub trait Aggregate:
    Default + Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Constant routing name of this aggregate variant, e.g. `"todo"`.
    const AGGREGATE_TYPE: &'static str;

    /// The closed set of event payloads this aggregate produces and consumes.
    type Event: EventData;

    /// Returns the shared base state.
    fn base(&self) -> &AggregateBase;

    /// Returns the shared base state for event-specific mutation.
    fn base_mut(&mut self) -> &mut AggregateBase;

    /// Apply one event's payload to the aggregate state.
    ///
    /// Called by the pipeline and by replay, never directly by callers. The
    /// version and `updated_at` bookkeeping happens outside this method.
    fn apply(&mut self, event: &Event<Self::Event>);

    /// Returns the aggregate identifier, empty if not yet created.
    fn id(&self) -> &str {
        &self.base().id
    }

    /// Returns the routing name of this aggregate.
    fn aggregate_type(&self) -> &'static str {
        Self::AGGREGATE_TYPE
    }

    /// Returns the current version (number of events applied).
    fn version(&self) -> u64 {
        self.base().version()
    }
}

/// Applies `event` to `aggregate`, then advances its version and
/// `updated_at`, in that order.
pub(crate) fn apply_event<A: Aggregate>(aggregate: &mut A, event: &Event<A::Event>) {
    aggregate.apply(event);
    let base = aggregate.base_mut();
    base.increment_version();
    base.set_updated_at(event.timestamp);
}
