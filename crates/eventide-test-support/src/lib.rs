//! Shared test doubles and utilities for the Eventide runtime.

mod clock;
mod ids;
mod reactor;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use ids::SequenceIds;
pub use reactor::{ChannelAsyncReactor, FailingSyncReactor, RecordingSyncReactor};
pub use store::{FailurePoint, InMemoryStore, InMemoryTransaction};
