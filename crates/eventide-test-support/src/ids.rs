//! Test id generator — predictable `IdGenerator` for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use eventide_core::id::IdGenerator;

/// Produces `"{prefix}-1"`, `"{prefix}-2"`, ... in call order.
#[derive(Debug)]
pub struct SequenceIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequenceIds {
    /// Create a generator with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{n}", self.prefix)
    }
}
