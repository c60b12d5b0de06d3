#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Seedable random source for virtual users.
//!
//! Every virtual user owns its own [`Rng`]. A run that starts from a fixed
//! seed (`LOADGEN_SEED`) forks one child generator per user from a single
//! root, so the full request stream of a run is reproducible.
//!
//! # Examples
//!
//! ```rust
//! use loadgen_random::Rng;
//! use loadgen_random::rand::RngCore as _;
//!
//! let mut a = Rng::from_seed(7_u64);
//! let mut b = Rng::from_seed(7_u64);
//!
//! assert_eq!(a.next_u64(), b.next_u64());
//! ```

use rand::{RngCore, SeedableRng as _, rngs::SmallRng};

/// Re-export of the `rand` crate so callers can reach its distribution traits
/// without declaring the dependency themselves.
pub use rand;

/// Environment variable holding the seed for a reproducible run.
pub const SEED_ENV: &str = "LOADGEN_SEED";

fn entropy_seed() -> u64 {
    SmallRng::from_os_rng().next_u64()
}

/// Parses a `LOADGEN_SEED` value.
///
/// Surrounding whitespace is ignored. Returns `None` when the value is not a
/// valid `u64`.
#[must_use]
pub fn parse_seed(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// A seeded, exclusively owned random generator.
pub struct Rng {
    seed: u64,
    inner: SmallRng,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rng").field("seed", &self.seed).finish_non_exhaustive()
    }
}

impl Rng {
    /// Creates a generator seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::from_seed(None::<u64>)
    }

    /// Creates a generator from an optional seed.
    ///
    /// If `None` is provided, the generator is seeded from OS entropy.
    #[must_use]
    pub fn from_seed<S: Into<Option<u64>>>(seed: S) -> Self {
        let seed = seed.into().unwrap_or_else(entropy_seed);

        Self {
            seed,
            inner: SmallRng::seed_from_u64(seed),
        }
    }

    /// The seed this generator was created from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives an independent child generator.
    ///
    /// The child's seed is the next value drawn from `self`, so a sequence of
    /// forks from the same root seed is itself reproducible.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        Self::from_seed(self.inner.next_u64())
    }
}

impl RngCore for Rng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }
}
