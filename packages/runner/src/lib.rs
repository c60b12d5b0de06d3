#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Drives a population of virtual users against a metrics-ingestion
//! service.
//!
//! Users are ramped up at a fixed spawn rate and each runs the
//! [`TrafficProfile`] loop independently until the run time elapses or the
//! run is cancelled.

use std::{sync::Arc, time::Duration};

use loadgen_profile::TrafficProfile;
use loadgen_random::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod transport;
pub mod user;

pub use config::{ConfigError, PartialConfig, RunnerConfig};
pub use transport::{StatusCode, Transport};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Users that were started before the run ended.
    pub users: usize,
    /// Ticks taken across all users.
    pub ticks: u64,
}

pub struct Runner {
    config: RunnerConfig,
    profile: Arc<TrafficProfile>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Runner {
    #[must_use]
    pub fn new(
        config: RunnerConfig,
        profile: TrafficProfile,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            profile: Arc::new(profile),
            transport,
        }
    }

    /// A runner sending over a [`transport::reqwest::ReqwestTransport`] built
    /// from `config.host` and `config.request_timeout`.
    ///
    /// # Errors
    ///
    /// * If the transport cannot be built for `config.host`
    #[cfg(feature = "reqwest")]
    pub fn with_reqwest(config: RunnerConfig, profile: TrafficProfile) -> Result<Self, Error> {
        let transport =
            transport::reqwest::ReqwestTransport::new(&config.host, config.request_timeout)?;

        Ok(Self::new(config, profile, Arc::new(transport)))
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs until the configured run time elapses or `token` is cancelled.
    ///
    /// Users are started one every `1 / spawn_rate` seconds. Each gets its
    /// own random source forked from a root seeded with `config.seed`, so a
    /// fixed seed replays the same per-user request streams.
    ///
    /// # Errors
    ///
    /// * If a user task panicked
    pub async fn run(&self, token: CancellationToken) -> Result<RunSummary, Error> {
        let token = token.child_token();
        let mut root = Rng::from_seed(self.config.seed);
        let spawn_interval =
            Duration::try_from_secs_f64(1.0 / self.config.spawn_rate).unwrap_or(Duration::MAX);

        log::info!(
            "Starting {} users against {} at {}/s seed={}",
            self.config.users,
            self.config.host,
            self.config.spawn_rate,
            root.seed(),
        );

        if let Some(run_time) = self.config.run_time {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(run_time) => {
                        log::info!("Run time of {run_time:?} elapsed");
                        token.cancel();
                    }
                }
            });
        }

        let mut handles: Vec<JoinHandle<u64>> = Vec::new();

        for id in 0..self.config.users {
            if id > 0 {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(spawn_interval) => {}
                }
            }
            if token.is_cancelled() {
                break;
            }

            handles.push(tokio::spawn(user::run_virtual_user(
                id,
                self.profile.clone(),
                self.transport.clone(),
                root.fork(),
                token.clone(),
            )));
        }

        log::debug!("Spawned {} users", handles.len());

        token.cancelled().await;

        let mut summary = RunSummary {
            users: handles.len(),
            ticks: 0,
        };
        for handle in handles {
            summary.ticks += handle.await?;
        }

        log::info!("Stopped {} users after {} ticks", summary.users, summary.ticks);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use loadgen_profile::{ANALYZE_PATH, HEALTH_PATH, METRICS_PATH, Request};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::simulator::SimulatorTransport;

    #[cfg(feature = "reqwest")]
    #[test_log::test]
    fn test_with_reqwest_rejects_an_invalid_host() {
        let result = Runner::with_reqwest(
            RunnerConfig {
                host: "not a url".into(),
                ..RunnerConfig::default()
            },
            TrafficProfile::default(),
        );

        assert!(matches!(
            result,
            Err(Error::Transport(transport::Error::Url(_)))
        ));
    }

    #[cfg(feature = "reqwest")]
    #[test_log::test]
    fn test_with_reqwest_keeps_the_config() {
        let runner =
            Runner::with_reqwest(RunnerConfig::default(), TrafficProfile::default()).unwrap();

        assert_eq!(runner.config(), &RunnerConfig::default());
    }

    #[test_log::test]
    fn test_config_errors_convert() {
        let error = Error::from(ConfigError::ZeroUsers);

        assert!(matches!(error, Error::Config(ConfigError::ZeroUsers)));
        assert_eq!(error.to_string(), "User count must be at least 1");
    }

    fn config(users: usize, spawn_rate: f64, run_time: Option<Duration>) -> RunnerConfig {
        RunnerConfig {
            users,
            spawn_rate,
            run_time,
            seed: Some(11),
            ..RunnerConfig::default()
        }
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_run_stops_after_run_time() {
        let transport = Arc::new(SimulatorTransport::new());
        let runner = Runner::new(
            config(4, 100.0, Some(Duration::from_secs(3))),
            TrafficProfile::default(),
            transport.clone(),
        );

        let summary = runner.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.users, 4);
        assert_eq!(summary.ticks, transport.len() as u64);
        assert!(summary.ticks > 4 * 20, "ticks={}", summary.ticks);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_run_sends_only_known_requests() {
        let transport = Arc::new(SimulatorTransport::new());
        let runner = Runner::new(
            config(3, 10.0, Some(Duration::from_secs(2))),
            TrafficProfile::default(),
            transport.clone(),
        );

        runner.run(CancellationToken::new()).await.unwrap();

        for request in transport.requests() {
            assert!(
                request == Request::get(ANALYZE_PATH)
                    || request == Request::get(HEALTH_PATH)
                    || (request.path == METRICS_PATH && request.body.is_some()),
                "{request}"
            );
        }
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_ramp_up_is_cut_short_by_run_time() {
        let runner = Runner::new(
            config(5, 1.0, Some(Duration::from_millis(2_500))),
            TrafficProfile::default(),
            Arc::new(SimulatorTransport::new()),
        );

        let summary = runner.run(CancellationToken::new()).await.unwrap();

        // Users start at t=0s, 1s and 2s
        assert_eq!(summary.users, 3);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_external_cancellation_stops_the_run() {
        let token = CancellationToken::new();
        let runner = Arc::new(Runner::new(
            config(2, 10.0, None),
            TrafficProfile::default(),
            Arc::new(SimulatorTransport::new()),
        ));

        let handle = tokio::spawn({
            let runner = runner.clone();
            let token = token.clone();
            async move { runner.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        let summary = handle.await.unwrap().unwrap();

        assert_eq!(summary.users, 2);
        assert!(summary.ticks > 0);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_already_cancelled_starts_no_users() {
        let token = CancellationToken::new();
        token.cancel();
        let transport = Arc::new(SimulatorTransport::new());
        let runner = Runner::new(
            config(5, 10.0, None),
            TrafficProfile::default(),
            transport.clone(),
        );

        let summary = runner.run(token).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(transport.is_empty());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_failing_service_does_not_end_the_run() {
        let transport = Arc::new(SimulatorTransport::with_status(
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
        let runner = Runner::new(
            config(2, 10.0, Some(Duration::from_secs(1))),
            TrafficProfile::default(),
            transport.clone(),
        );

        let summary = runner.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.users, 2);
        assert!(summary.ticks > 2, "ticks={}", summary.ticks);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_same_seed_replays_the_same_run() {
        async fn bodies() -> Vec<(usize, Option<(f64, f64)>)> {
            let transport = Arc::new(SimulatorTransport::new());
            let runner = Runner::new(
                config(1, 10.0, Some(Duration::from_secs(1))),
                TrafficProfile::default(),
                transport.clone(),
            );
            runner.run(CancellationToken::new()).await.unwrap();

            transport
                .requests()
                .into_iter()
                .enumerate()
                .map(|(i, r)| (i, r.body.map(|s| (s.cpu, s.rps))))
                .collect()
        }

        assert_eq!(bodies().await, bodies().await);
    }
}
