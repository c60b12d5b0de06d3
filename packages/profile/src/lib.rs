#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Traffic shape of a metrics-ingestion load test.
//!
//! A [`TrafficProfile`] turns a [`VirtualUser`] and a random source into a
//! stream of [`Request`]s:
//!
//! * `POST /metrics` with a normal sample (weight 10)
//! * `POST /metrics` with an anomalous RPS spike (weight 1)
//! * `GET /analyze` (weight 1)
//! * `GET /health` (weight 1)
//!
//! with a uniformly random pause of 10-100 ms between two requests.
//!
//! # Examples
//!
//! ```rust
//! use loadgen_profile::{TrafficProfile, current_timestamp};
//! use loadgen_random::Rng;
//!
//! let profile = TrafficProfile::default();
//! let user = profile.initialize();
//! let mut rng = Rng::from_seed(1_u64);
//!
//! let (action, request) = profile.tick(&user, current_timestamp(), &mut rng);
//! let delay = profile.next_delay(&mut rng);
//! # let _ = (action, request, delay);
//! ```

use std::time::Duration;

use rand::{RngCore, distr::Distribution as _, distr::weighted::WeightedIndex};
use rand_distr::Normal;
use thiserror::Error;

mod action;
mod pacing;
mod request;
mod sample;

pub use action::{Action, ActionWeights};
pub use pacing::Pacing;
pub use request::{ANALYZE_PATH, HEALTH_PATH, METRICS_PATH, Method, Request};
pub use sample::{
    DEFAULT_BASELINE_CPU, DEFAULT_BASELINE_RPS, MetricSample, SampleShape, VirtualUser,
    current_timestamp, unix_timestamp,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("At least one action weight must be non-zero")]
    ZeroWeights,
    #[error(transparent)]
    Weights(#[from] rand::distr::weighted::Error),
    #[error("Invalid sample shape: mean={mean} std_dev={std_dev}")]
    InvalidShape { mean: f64, std_dev: f64 },
    #[error("Invalid baseline {name}={value}")]
    InvalidBaseline { name: &'static str, value: f64 },
    #[error("Invalid pacing range: min={min:?} is greater than max={max:?}")]
    InvalidPacing { min: Duration, max: Duration },
}

/// Rules that decide what each virtual user sends and when.
///
/// A profile holds no per-user state; all of it lives in the [`VirtualUser`]
/// returned by [`TrafficProfile::initialize`], so a single profile can be
/// shared by every user of a run.
#[derive(Debug, Clone)]
pub struct TrafficProfile {
    baseline_cpu: f64,
    baseline_rps: f64,
    weights: ActionWeights,
    selector: WeightedIndex<u32>,
    pacing: Pacing,
    cpu_noise: Normal<f64>,
    normal_rps_noise: Normal<f64>,
    anomalous_rps_noise: Normal<f64>,
}

impl Default for TrafficProfile {
    fn default() -> Self {
        Self {
            baseline_cpu: DEFAULT_BASELINE_CPU,
            baseline_rps: DEFAULT_BASELINE_RPS,
            weights: ActionWeights::default(),
            selector: default_selector(),
            pacing: Pacing::default(),
            cpu_noise: default_noise(SampleShape::CPU),
            normal_rps_noise: default_noise(SampleShape::NORMAL_RPS),
            anomalous_rps_noise: default_noise(SampleShape::ANOMALOUS_RPS),
        }
    }
}

fn default_selector() -> WeightedIndex<u32> {
    WeightedIndex::new(ActionWeights::default().as_array()).expect("Default weights are valid")
}

fn default_noise(shape: SampleShape) -> Normal<f64> {
    Normal::new(shape.mean, shape.std_dev).expect("Default sample shapes are valid")
}

impl TrafficProfile {
    #[must_use]
    pub fn builder() -> TrafficProfileBuilder {
        TrafficProfileBuilder::default()
    }

    #[must_use]
    pub const fn weights(&self) -> &ActionWeights {
        &self.weights
    }

    #[must_use]
    pub const fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Starts a new virtual user at the profile's baselines.
    #[must_use]
    pub const fn initialize(&self) -> VirtualUser {
        VirtualUser::new(self.baseline_cpu, self.baseline_rps)
    }

    /// A sample around the user's baselines.
    pub fn generate_normal_sample(
        &self,
        user: &VirtualUser,
        now: i64,
        rng: &mut impl RngCore,
    ) -> MetricSample {
        MetricSample {
            timestamp: now,
            cpu: sample::draw(user.baseline_cpu(), &self.cpu_noise, rng),
            rps: sample::draw(user.baseline_rps(), &self.normal_rps_noise, rng),
        }
    }

    /// A sample whose RPS is shifted by the anomalous spike.
    pub fn generate_anomalous_sample(
        &self,
        user: &VirtualUser,
        now: i64,
        rng: &mut impl RngCore,
    ) -> MetricSample {
        MetricSample {
            timestamp: now,
            cpu: sample::draw(user.baseline_cpu(), &self.cpu_noise, rng),
            rps: sample::draw(user.baseline_rps(), &self.anomalous_rps_noise, rng),
        }
    }

    #[must_use]
    pub const fn query_analytics(&self) -> Request {
        Request::get(ANALYZE_PATH)
    }

    #[must_use]
    pub const fn query_health(&self) -> Request {
        Request::get(HEALTH_PATH)
    }

    /// Picks the next action by weight.
    pub fn select_action(&self, rng: &mut impl RngCore) -> Action {
        Action::ALL[self.selector.sample(rng)]
    }

    /// Builds the request for `action`.
    pub fn request_for(
        &self,
        action: Action,
        user: &VirtualUser,
        now: i64,
        rng: &mut impl RngCore,
    ) -> Request {
        match action {
            Action::NormalMetric => {
                Request::post_metric(self.generate_normal_sample(user, now, rng))
            }
            Action::AnomalousMetric => {
                Request::post_metric(self.generate_anomalous_sample(user, now, rng))
            }
            Action::QueryAnalytics => self.query_analytics(),
            Action::QueryHealth => self.query_health(),
        }
    }

    /// One scheduling tick: select an action and produce its request.
    pub fn tick(&self, user: &VirtualUser, now: i64, rng: &mut impl RngCore) -> (Action, Request) {
        let action = self.select_action(rng);
        log::trace!("tick: action={action}");
        (action, self.request_for(action, user, now, rng))
    }

    /// Think time before the next tick.
    pub fn next_delay(&self, rng: &mut impl RngCore) -> Duration {
        self.pacing.next_delay(rng)
    }

    /// Requests per second one user issues, ignoring response latency.
    ///
    /// Returns `f64::INFINITY` when the pacing range is zero.
    #[must_use]
    pub fn expected_user_rps(&self) -> f64 {
        let mean = self.pacing.mean();
        if mean.is_zero() {
            f64::INFINITY
        } else {
            1.0 / mean.as_secs_f64()
        }
    }

    /// Number of users needed to reach `target_rps`, at least one.
    #[must_use]
    pub fn users_for_target_rps(&self, target_rps: f64) -> usize {
        let mean = self.pacing.mean();
        if !target_rps.is_finite() || target_rps <= 0.0 || mean.is_zero() {
            return 1;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let users = (target_rps * mean.as_secs_f64()).ceil() as usize;
        users.max(1)
    }
}

/// Builder for a [`TrafficProfile`]. Unset fields take the 10:1:1:1,
/// 50/100 baseline, 10-100 ms defaults.
#[derive(Debug, Clone)]
pub struct TrafficProfileBuilder {
    baseline_cpu: f64,
    baseline_rps: f64,
    weights: ActionWeights,
    pacing: Pacing,
    cpu_noise: SampleShape,
    normal_rps_noise: SampleShape,
    anomalous_rps_noise: SampleShape,
}

impl Default for TrafficProfileBuilder {
    fn default() -> Self {
        Self {
            baseline_cpu: DEFAULT_BASELINE_CPU,
            baseline_rps: DEFAULT_BASELINE_RPS,
            weights: ActionWeights::default(),
            pacing: Pacing::default(),
            cpu_noise: SampleShape::CPU,
            normal_rps_noise: SampleShape::NORMAL_RPS,
            anomalous_rps_noise: SampleShape::ANOMALOUS_RPS,
        }
    }
}

impl TrafficProfileBuilder {
    #[must_use]
    pub const fn with_baseline_cpu(mut self, baseline_cpu: f64) -> Self {
        self.baseline_cpu = baseline_cpu;
        self
    }

    #[must_use]
    pub const fn with_baseline_rps(mut self, baseline_rps: f64) -> Self {
        self.baseline_rps = baseline_rps;
        self
    }

    #[must_use]
    pub const fn with_weights(mut self, weights: ActionWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub const fn with_cpu_noise(mut self, shape: SampleShape) -> Self {
        self.cpu_noise = shape;
        self
    }

    #[must_use]
    pub const fn with_normal_rps_noise(mut self, shape: SampleShape) -> Self {
        self.normal_rps_noise = shape;
        self
    }

    #[must_use]
    pub const fn with_anomalous_rps_noise(mut self, shape: SampleShape) -> Self {
        self.anomalous_rps_noise = shape;
        self
    }

    /// # Errors
    ///
    /// * If every action weight is zero
    /// * If a baseline is not finite
    /// * If a sample shape has a non-finite mean or an invalid standard deviation
    pub fn build(self) -> Result<TrafficProfile, BuildError> {
        if self.weights.total() == 0 {
            return Err(BuildError::ZeroWeights);
        }
        if !self.baseline_cpu.is_finite() {
            return Err(BuildError::InvalidBaseline {
                name: "cpu",
                value: self.baseline_cpu,
            });
        }
        if !self.baseline_rps.is_finite() {
            return Err(BuildError::InvalidBaseline {
                name: "rps",
                value: self.baseline_rps,
            });
        }

        Ok(TrafficProfile {
            baseline_cpu: self.baseline_cpu,
            baseline_rps: self.baseline_rps,
            weights: self.weights,
            selector: WeightedIndex::new(self.weights.as_array())?,
            pacing: self.pacing,
            cpu_noise: self.cpu_noise.distribution()?,
            normal_rps_noise: self.normal_rps_noise.distribution()?,
            anomalous_rps_noise: self.anomalous_rps_noise.distribution()?,
        })
    }
}
