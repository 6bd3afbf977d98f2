//! Eventide Event Store — `PostgreSQL` implementation of the transaction
//! contract.

pub mod config;
pub mod error;
pub mod pg_event_store;
pub mod schema;

pub use config::{ConfigError, PgStoreConfig};
pub use pg_event_store::{PgEventStore, PgTransaction};
