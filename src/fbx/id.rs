//! Identifier allocation for authoring layers.

/// A monotonically increasing identifier counter.
///
/// Authoring layers stamp every object they emit with a unique id. The
/// counter is an explicit value that callers construct and pass around, so
/// tests can seed and reset it deterministically; there is no process-wide
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGenerator {
    next: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_seed(1)
    }

    /// Start counting from the given seed.
    pub fn with_seed(seed: i64) -> Self {
        IdGenerator { next: seed }
    }

    /// Allocate the next identifier.
    pub fn next_id(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Return the counter to its initial seed.
    pub fn reset(&mut self, seed: i64) {
        self.next = seed;
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
