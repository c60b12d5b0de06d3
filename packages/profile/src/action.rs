//! The four actions a virtual user chooses between on each tick.

use strum::{AsRefStr, Display, EnumIter, EnumString};

/// What a virtual user does on one scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(EnumString, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// `POST /metrics` with a sample drawn around the user's baselines.
    NormalMetric,
    /// `POST /metrics` with an RPS spike.
    AnomalousMetric,
    /// `GET /analyze`.
    QueryAnalytics,
    /// `GET /health`.
    QueryHealth,
}

impl Action {
    /// Every action, in weight-table order.
    pub const ALL: [Self; 4] = [
        Self::NormalMetric,
        Self::AnomalousMetric,
        Self::QueryAnalytics,
        Self::QueryHealth,
    ];
}

/// Relative selection weights for each [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionWeights {
    pub normal_metric: u32,
    pub anomalous_metric: u32,
    pub query_analytics: u32,
    pub query_health: u32,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionWeights {
    /// The 10:1:1:1 mix.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            normal_metric: 10,
            anomalous_metric: 1,
            query_analytics: 1,
            query_health: 1,
        }
    }

    #[must_use]
    pub const fn weight(&self, action: Action) -> u32 {
        match action {
            Action::NormalMetric => self.normal_metric,
            Action::AnomalousMetric => self.anomalous_metric,
            Action::QueryAnalytics => self.query_analytics,
            Action::QueryHealth => self.query_health,
        }
    }

    #[must_use]
    pub const fn as_array(&self) -> [u32; 4] {
        [
            self.normal_metric,
            self.anomalous_metric,
            self.query_analytics,
            self.query_health,
        ]
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.as_array().iter().map(|&w| u64::from(w)).sum()
    }

    /// Expected fraction of ticks that pick `action`, or `0.0` when every
    /// weight is zero.
    #[must_use]
    pub fn share(&self, action: Action) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let share = f64::from(self.weight(action)) / total as f64;
        share
    }
}
