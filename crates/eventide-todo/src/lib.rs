//! Eventide — Todo aggregate.
//!
//! A todo is created with a text and an author, and its text can be updated.
//! The application layer wires the aggregate into a runtime, keeps an
//! activity feed and caps how often a todo may be edited.

pub mod application;
pub mod domain;
