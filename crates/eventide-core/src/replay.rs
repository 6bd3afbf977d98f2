//! Replay: rebuilding aggregate state from event history.

use crate::aggregate::{Aggregate, apply_event};
use crate::error::DomainError;
use crate::event::{Event, EventData};
use crate::registry::EventRegistry;
use crate::store::EventStoreRecord;

/// Decodes records in the order given.
///
/// # Errors
///
/// Returns the first decode error.
pub fn decode_history<D: EventData>(
    registry: &EventRegistry,
    records: &[EventStoreRecord],
) -> Result<Vec<Event<D>>, DomainError> {
    records.iter().map(|record| registry.decode(record)).collect()
}

/// Folds events over `A::default()` with the same apply bookkeeping the
/// pipeline uses, so the version ends equal to the number of events.
#[must_use]
pub fn fold<A: Aggregate>(events: &[Event<A::Event>]) -> A {
    events.iter().fold(A::default(), |mut aggregate, event| {
        apply_event(&mut aggregate, event);
        aggregate
    })
}

/// Decodes and folds an ordered history.
///
/// # Errors
///
/// Returns the first decode error.
pub fn replay<A: Aggregate>(
    registry: &EventRegistry,
    records: &[EventStoreRecord],
) -> Result<A, DomainError> {
    let events = decode_history::<A::Event>(registry, records)?;
    Ok(fold(&events))
}
