//! Deterministic RNG for the simulation scheduler.
//!
//! The synthesized model is nondeterministic; the simulator resolves every
//! choice through this seeded stream so runs can be replayed.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic RNG for simulation scheduling.
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: ChaCha8Rng,
}

impl SimRng {
    /// Create a new RNG from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Derive a child RNG from the current stream.
    ///
    /// Each run of a batch draws from its own child, so adding runs does not
    /// change the earlier ones.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        let seed = self.inner.next_u64();
        Self::new(seed)
    }

    /// Pick an index below `len`; `None` when there is nothing to pick.
    pub fn pick(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.inner.gen_range(0..len))
    }
}
