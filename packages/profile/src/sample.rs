//! Virtual-user baselines and the metric samples they emit.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand_distr::{Distribution as _, Normal};
use serde::{Deserialize, Serialize};

use crate::BuildError;

/// Baseline CPU assigned to every new virtual user.
pub const DEFAULT_BASELINE_CPU: f64 = 50.0;

/// Baseline requests-per-second assigned to every new virtual user.
pub const DEFAULT_BASELINE_RPS: f64 = 100.0;

/// One simulated client session.
///
/// Baselines are fixed when the session starts and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualUser {
    baseline_cpu: f64,
    baseline_rps: f64,
}

impl VirtualUser {
    #[must_use]
    pub const fn new(baseline_cpu: f64, baseline_rps: f64) -> Self {
        Self {
            baseline_cpu,
            baseline_rps,
        }
    }

    #[must_use]
    pub const fn baseline_cpu(&self) -> f64 {
        self.baseline_cpu
    }

    #[must_use]
    pub const fn baseline_rps(&self) -> f64 {
        self.baseline_rps
    }
}

impl Default for VirtualUser {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_CPU, DEFAULT_BASELINE_RPS)
    }
}

/// Payload of a `POST /metrics` request.
///
/// Serializes to exactly `{"timestamp": <int>, "cpu": <float>, "rps": <float>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub cpu: f64,
    pub rps: f64,
}

/// Mean offset and standard deviation of a normally distributed noise term.
///
/// A sample value is `baseline + N(mean, std_dev)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleShape {
    pub mean: f64,
    pub std_dev: f64,
}

impl SampleShape {
    /// CPU noise shared by normal and anomalous samples.
    pub const CPU: Self = Self::new(0.0, 5.0);
    /// RPS noise of a normal sample.
    pub const NORMAL_RPS: Self = Self::new(0.0, 10.0);
    /// RPS spike of an anomalous sample.
    pub const ANOMALOUS_RPS: Self = Self::new(150.0, 30.0);

    #[must_use]
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// # Errors
    ///
    /// * If the mean is not finite
    /// * If the standard deviation is negative or not finite
    pub(crate) fn distribution(self) -> Result<Normal<f64>, BuildError> {
        if !self.mean.is_finite() || !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(BuildError::InvalidShape {
                mean: self.mean,
                std_dev: self.std_dev,
            });
        }

        Normal::new(self.mean, self.std_dev).map_err(|_| BuildError::InvalidShape {
            mean: self.mean,
            std_dev: self.std_dev,
        })
    }
}

/// Draws `baseline + noise`.
pub(crate) fn draw(baseline: f64, noise: &Normal<f64>, rng: &mut impl RngCore) -> f64 {
    baseline + noise.sample(rng)
}

/// Converts a wall-clock time into whole seconds since the Unix epoch.
///
/// Times before the epoch map to `0`.
#[must_use]
pub fn unix_timestamp(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

/// The current time in whole seconds since the Unix epoch.
#[must_use]
pub fn current_timestamp() -> i64 {
    unix_timestamp(SystemTime::now())
}
