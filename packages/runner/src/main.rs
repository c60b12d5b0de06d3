#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Command-line load generator for a metrics-ingestion service.
//!
//! # Usage
//!
//! Twenty users against a local service until interrupted:
//! ```bash
//! loadgen
//! ```
//!
//! Enough users for roughly 1000 requests per second, for five minutes:
//! ```bash
//! loadgen --host http://ingest:8080 --target-rps 1000 --run-time 5m
//! ```
//!
//! Every flag can also be given as a `LOADGEN_*` environment variable; flags
//! take precedence.

use std::time::Duration;

use clap::Parser;
use loadgen_profile::TrafficProfile;
use loadgen_runner::{PartialConfig, Runner, config};
use tokio_util::sync::CancellationToken;

/// Generate metrics-ingestion traffic
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the ingestion service [env: LOADGEN_HOST]
    #[arg(long)]
    host: Option<String>,

    /// Number of virtual users [env: LOADGEN_USERS]
    #[arg(short, long, conflicts_with = "target_rps")]
    users: Option<usize>,

    /// Size the user count to reach this many requests per second
    /// [env: LOADGEN_TARGET_RPS]
    #[arg(long)]
    target_rps: Option<f64>,

    /// Users started per second [env: LOADGEN_SPAWN_RATE]
    #[arg(short = 'r', long)]
    spawn_rate: Option<f64>,

    /// Stop after this long, e.g. 90, 30s, 5m, 1h [env: LOADGEN_RUN_TIME]
    #[arg(short = 't', long, value_parser = parse_run_time)]
    run_time: Option<Duration>,

    /// Per-request timeout in milliseconds [env: LOADGEN_TIMEOUT_MS]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Seed for reproducible traffic [env: LOADGEN_SEED]
    #[arg(long)]
    seed: Option<u64>,
}

impl From<Args> for PartialConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            users: args.users,
            target_rps: args.target_rps,
            spawn_rate: args.spawn_rate,
            run_time: args.run_time,
            request_timeout: args.timeout_ms.map(Duration::from_millis),
            seed: args.seed,
        }
    }
}

fn parse_run_time(value: &str) -> Result<Duration, String> {
    config::parse_run_time(value)
        .ok_or_else(|| format!("invalid run time '{value}', expected e.g. 90, 30s, 5m or 1h"))
}

/// Flags over `LOADGEN_*` variables over defaults.
fn build_runner(args: Args) -> Result<Runner, loadgen_runner::Error> {
    let profile = TrafficProfile::default();
    let config = PartialConfig::from(args)
        .or(PartialConfig::from_env()?)
        .resolve(&profile)?;

    Runner::with_reqwest(config, profile)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    loadgen_logging::init()?;

    let runner = build_runner(Args::parse())?;

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for ctrl-c: {e:?}");
                return;
            }
            log::info!("Received ctrl-c, stopping");
            token.cancel();
        }
    });

    let summary = runner.run(token).await?;

    log::info!("Finished: {} users, {} requests", summary.users, summary.ticks);

    Ok(())
}
