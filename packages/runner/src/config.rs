//! Run settings from flags and `LOADGEN_*` environment variables.
//!
//! Every setting is optional at the source level ([`PartialConfig`]); sources
//! are layered with [`PartialConfig::or`] and then resolved against the
//! traffic profile into a complete [`RunnerConfig`].

use std::time::Duration;

use loadgen_profile::TrafficProfile;
use loadgen_random::{SEED_ENV, parse_seed};
use thiserror::Error;
use url::Url;

pub const HOST_ENV: &str = "LOADGEN_HOST";
pub const USERS_ENV: &str = "LOADGEN_USERS";
pub const TARGET_RPS_ENV: &str = "LOADGEN_TARGET_RPS";
pub const SPAWN_RATE_ENV: &str = "LOADGEN_SPAWN_RATE";
pub const RUN_TIME_ENV: &str = "LOADGEN_RUN_TIME";
pub const TIMEOUT_MS_ENV: &str = "LOADGEN_TIMEOUT_MS";

pub const DEFAULT_HOST: &str = "http://localhost:8080";
pub const DEFAULT_USERS: usize = 20;
pub const DEFAULT_SPAWN_RATE: f64 = 10.0;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the resolved user count, one tokio task each.
pub const MAX_USERS: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name}='{value}': {message}")]
    InvalidVar {
        name: &'static str,
        value: String,
        message: String,
    },
    #[error("Invalid host '{host}': {source}")]
    InvalidHost {
        host: String,
        source: url::ParseError,
    },
    #[error("Unsupported scheme '{scheme}' in host '{host}', expected http or https")]
    UnsupportedScheme { host: String, scheme: String },
    #[error("User count must be at least 1")]
    ZeroUsers,
    #[error("User count {users} exceeds the maximum of {max}")]
    TooManyUsers { users: usize, max: usize },
    #[error("Target RPS must be positive and finite, got {0}")]
    InvalidTargetRps(f64),
    #[error("Spawn rate must be positive and finite, got {0}")]
    InvalidSpawnRate(f64),
    #[error("Request timeout must be non-zero")]
    ZeroTimeout,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Base URL of the ingestion service.
    pub host: String,
    pub users: usize,
    /// Users started per second during ramp-up.
    pub spawn_rate: f64,
    /// Stop after this long. `None` runs until cancelled.
    pub run_time: Option<Duration>,
    pub request_timeout: Duration,
    /// Root seed every user's random source is forked from.
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            users: DEFAULT_USERS,
            spawn_rate: DEFAULT_SPAWN_RATE,
            run_time: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            seed: None,
        }
    }
}

/// One layer of settings where anything may be unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub host: Option<String>,
    pub users: Option<usize>,
    pub target_rps: Option<f64>,
    pub spawn_rate: Option<f64>,
    pub run_time: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub seed: Option<u64>,
}

impl PartialConfig {
    /// Reads the `LOADGEN_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// * If a variable is set to a value that fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the `LOADGEN_*` variables through `lookup`. Empty values count
    /// as unset.
    ///
    /// # Errors
    ///
    /// * If a variable is set to a value that fails to parse
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (name, value))
        };

        Ok(Self {
            host: var(HOST_ENV).map(|(_, value)| value),
            users: var(USERS_ENV).map(parse_number).transpose()?,
            target_rps: var(TARGET_RPS_ENV).map(parse_number).transpose()?,
            spawn_rate: var(SPAWN_RATE_ENV).map(parse_number).transpose()?,
            run_time: var(RUN_TIME_ENV)
                .map(|(name, value)| {
                    parse_run_time(&value).ok_or_else(|| ConfigError::InvalidVar {
                        name,
                        value,
                        message: "expected seconds or a duration like 30s, 5m or 1h".into(),
                    })
                })
                .transpose()?,
            request_timeout: var(TIMEOUT_MS_ENV)
                .map(parse_number)
                .transpose()?
                .map(Duration::from_millis),
            seed: var(SEED_ENV)
                .map(|(name, value)| {
                    parse_seed(&value).ok_or_else(|| ConfigError::InvalidVar {
                        name,
                        value,
                        message: "expected an unsigned 64-bit integer".into(),
                    })
                })
                .transpose()?,
        })
    }

    /// Fills settings missing from `self` with those of `fallback`.
    ///
    /// `users` and `target_rps` are one choice: if `self` sets either, neither
    /// is taken from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        let (users, target_rps) = if self.users.is_some() || self.target_rps.is_some() {
            (self.users, self.target_rps)
        } else {
            (fallback.users, fallback.target_rps)
        };

        Self {
            host: self.host.or(fallback.host),
            users,
            target_rps,
            spawn_rate: self.spawn_rate.or(fallback.spawn_rate),
            run_time: self.run_time.or(fallback.run_time),
            request_timeout: self.request_timeout.or(fallback.request_timeout),
            seed: self.seed.or(fallback.seed),
        }
    }

    /// Applies defaults and validates.
    ///
    /// The user count is `users` if set, else enough users to reach
    /// `target_rps` under `profile`'s pacing, else [`DEFAULT_USERS`].
    ///
    /// # Errors
    ///
    /// * If the host is not an absolute `http` or `https` URL
    /// * If the user count resolves to zero or above [`MAX_USERS`]
    /// * If the target RPS or spawn rate is not positive and finite
    /// * If the request timeout is zero
    pub fn resolve(self, profile: &TrafficProfile) -> Result<RunnerConfig, ConfigError> {
        let defaults = RunnerConfig::default();

        let host = self.host.unwrap_or(defaults.host);
        match Url::parse(&host) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::UnsupportedScheme {
                    scheme: url.scheme().to_string(),
                    host,
                });
            }
            Err(source) => return Err(ConfigError::InvalidHost { host, source }),
        }

        let users = match (self.users, self.target_rps) {
            (Some(users), _) => users,
            (None, Some(rps)) if rps.is_finite() && rps > 0.0 => {
                let users = profile.users_for_target_rps(rps);
                log::debug!(
                    "Sizing {users} users for {rps} rps at {:.1} rps/user",
                    profile.expected_user_rps()
                );
                users
            }
            (None, Some(rps)) => return Err(ConfigError::InvalidTargetRps(rps)),
            (None, None) => defaults.users,
        };
        if users == 0 {
            return Err(ConfigError::ZeroUsers);
        }
        if users > MAX_USERS {
            return Err(ConfigError::TooManyUsers {
                users,
                max: MAX_USERS,
            });
        }

        let spawn_rate = self.spawn_rate.unwrap_or(defaults.spawn_rate);
        if !spawn_rate.is_finite() || spawn_rate <= 0.0 {
            return Err(ConfigError::InvalidSpawnRate(spawn_rate));
        }

        let request_timeout = self.request_timeout.unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(RunnerConfig {
            host,
            users,
            spawn_rate,
            run_time: self.run_time,
            request_timeout,
            seed: self.seed,
        })
    }
}

fn parse_number<T>((name, value): (&'static str, String)) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidVar {
        name,
        message: e.to_string(),
        value,
    })
}

/// Parses `90`, `90s`, `15m` or `2h`. A bare number is seconds.
#[must_use]
pub fn parse_run_time(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (number, unit) = match value.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&value[..i], c),
        _ => (value, 's'),
    };
    let number = number.trim().parse::<u64>().ok()?;

    let secs = match unit {
        's' => number,
        'm' => number.checked_mul(60)?,
        'h' => number.checked_mul(3600)?,
        _ => return None,
    };

    Some(Duration::from_secs(secs))
}
