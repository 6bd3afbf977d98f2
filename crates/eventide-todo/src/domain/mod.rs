//! Domain layer for the Todo aggregate.

pub mod aggregates;
pub mod commands;
pub mod events;
