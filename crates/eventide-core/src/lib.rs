//! Eventide Core — event-sourcing runtime.
//!
//! This crate defines the aggregate and event model, the event type
//! registry, the reactor bus and the command execution pipeline. Storage is
//! reached only through the [`store::Transaction`] contract; it contains no
//! database code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod id;
pub mod pipeline;
pub mod reactor;
pub mod registry;
pub mod replay;
pub mod store;

pub use aggregate::{Aggregate, AggregateBase};
pub use command::{Command, Payload};
pub use error::DomainError;
pub use event::{DomainEvent, Event, EventData, EventKind, Metadata};
pub use pipeline::{Runtime, RuntimeBuilder, TransactionScope};
pub use reactor::{AsyncReactor, EventMatcher, ReactorBus, SyncReactor};
pub use registry::EventRegistry;
pub use store::{AggregateRow, EventStore, EventStoreRecord, StoreError, Transaction};
