//! Domain layer for the User aggregate.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod tokens;
