//! Randomized think time between a virtual user's actions.

use std::time::Duration;

use rand::{Rng as _, RngCore};

use crate::BuildError;

/// Inclusive range a virtual user sleeps for between two actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(10),
            max: Duration::from_millis(100),
        }
    }
}

impl Pacing {
    /// # Errors
    ///
    /// * If `min` is greater than `max`
    pub const fn new(min: Duration, max: Duration) -> Result<Self, BuildError> {
        if min.as_nanos() > max.as_nanos() {
            return Err(BuildError::InvalidPacing { min, max });
        }

        Ok(Self { min, max })
    }

    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Midpoint of the range, the expected delay under uniform sampling.
    #[must_use]
    pub fn mean(&self) -> Duration {
        self.min + (self.max - self.min) / 2
    }

    /// Draws a delay uniformly from `[min, max]`.
    pub fn next_delay(&self, rng: &mut impl RngCore) -> Duration {
        let min = nanos(self.min);
        let max = nanos(self.max);

        if min == max {
            return self.min;
        }

        Duration::from_nanos(rng.random_range(min..=max))
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
