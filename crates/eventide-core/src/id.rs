//! Identifier generation.
//!
//! Event ids and the ids of newly created aggregates come from an
//! [`IdGenerator`]. In production this produces random UUIDs; tests inject a
//! predictable sequence.

use uuid::Uuid;

/// Produces globally unique string identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> String;
}

/// Generates hyphenated UUID v4 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
