//! Process-local record identifiers.

use crate::constants::ID_COUNTER_START;

/// Monotonic source of record ids.
///
/// Each cohort owns its own generator, so two cohorts (or two tests) never share a counter.
/// Ids are never reused for the lifetime of the generator.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    /// Creates a generator whose first id is `ID_COUNTER_START + 1`.
    pub fn new() -> Self {
        Self::starting_after(ID_COUNTER_START)
    }

    /// Creates a generator whose first id is `last + 1`.
    pub fn starting_after(last: u64) -> Self {
        Self { last }
    }

    /// Hands out the next id.
    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// The most recently issued id (or the starting point if none has been issued).
    pub fn last_issued(&self) -> u64 {
        self.last
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
