//! Small, explicit limit types used by the bounding algorithms.

/// How many times one event may be emitted in a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IterationBudget(pub u32);

impl IterationBudget {
    /// A non-loop event fires at most once per run.
    pub const ONCE: Self = Self(1);

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Number of entries a log must be able to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogCapacity(pub usize);

impl LogCapacity {
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// Check whether a log of `log_size` entries never overflows.
    #[must_use]
    pub fn fits_in(self, log_size: usize) -> bool {
        self.0 <= log_size
    }
}
