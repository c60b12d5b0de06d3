//! The loop a single virtual user runs until cancelled.

use std::sync::Arc;

use loadgen_profile::{Request, TrafficProfile, current_timestamp};
use loadgen_random::Rng;
use tokio_util::sync::CancellationToken;

use crate::transport::{Error, StatusCode, Transport};

/// Runs one virtual user: tick, send, pause, repeat.
///
/// Failed sends and non-2xx responses are logged and the loop moves on to the
/// next tick. Returns the number of ticks taken once `token` is cancelled;
/// an in-flight request or pause is abandoned at that point.
pub async fn run_virtual_user(
    id: usize,
    profile: Arc<TrafficProfile>,
    transport: Arc<dyn Transport>,
    mut rng: Rng,
    token: CancellationToken,
) -> u64 {
    let user = profile.initialize();
    let mut ticks = 0_u64;

    log::debug!("user {id}: started seed={}", rng.seed());

    while !token.is_cancelled() {
        let (action, request) = profile.tick(&user, current_timestamp(), &mut rng);
        ticks += 1;

        tokio::select! {
            () = token.cancelled() => break,
            result = transport.send(&request) => report(id, action.as_ref(), &request, result),
        }

        let delay = profile.next_delay(&mut rng);

        tokio::select! {
            () = token.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    log::debug!("user {id}: stopped after {ticks} ticks");

    ticks
}

fn report(id: usize, action: &str, request: &Request, result: Result<StatusCode, Error>) {
    match result {
        Ok(status) if status.is_success() => {
            loadgen_logging::debug_or_trace!(
                ("user {id}: {action} {request} -> {status}"),
                ("user {id}: {action} {request} body={:?} -> {status}", request.body)
            );
        }
        Ok(status) => {
            log::warn!("user {id}: {action} {} failed with status {status}", request.name());
        }
        Err(e) => {
            log::warn!("user {id}: {action} {} failed: {e:?}", request.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use loadgen_profile::{ANALYZE_PATH, HEALTH_PATH, METRICS_PATH, Method, unix_timestamp};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::simulator::SimulatorTransport;

    async fn run_for(transport: Arc<SimulatorTransport>, seed: u64, duration: Duration) -> u64 {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_virtual_user(
            0,
            Arc::new(TrafficProfile::default()),
            transport,
            Rng::from_seed(seed),
            token.clone(),
        ));

        tokio::time::sleep(duration).await;
        token.cancel();

        handle.await.unwrap()
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_sends_one_request_per_tick() {
        let transport = Arc::new(SimulatorTransport::new());

        let ticks = run_for(transport.clone(), 1, Duration::from_secs(2)).await;

        // 2s of 10-100 ms pauses
        assert!((20..=201).contains(&ticks), "ticks={ticks}");
        assert_eq!(transport.len() as u64, ticks);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_requests_target_known_endpoints() {
        let transport = Arc::new(SimulatorTransport::new());

        run_for(transport.clone(), 2, Duration::from_secs(5)).await;

        for request in transport.requests() {
            match request.method {
                Method::Post => {
                    assert_eq!(request.path, METRICS_PATH);
                    assert!(request.body.is_some());
                }
                Method::Get => {
                    assert!(request.path == ANALYZE_PATH || request.path == HEALTH_PATH);
                    assert_eq!(request.body, None);
                }
            }
        }
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_samples_carry_the_current_epoch_second() {
        let transport = Arc::new(SimulatorTransport::new());

        let before = unix_timestamp(SystemTime::now());
        run_for(transport.clone(), 7, Duration::from_secs(2)).await;
        let after = unix_timestamp(SystemTime::now());

        let timestamps: Vec<i64> = transport
            .requests()
            .into_iter()
            .filter_map(|r| r.body.map(|s| s.timestamp))
            .collect();

        assert!(!timestamps.is_empty());
        for timestamp in timestamps {
            assert!(
                (before..=after).contains(&timestamp),
                "timestamp={timestamp} not in {before}..={after}"
            );
        }
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_keeps_going_after_transport_errors() {
        let transport = Arc::new(SimulatorTransport::with_responder(|_| {
            Err(Error::Unavailable("connection refused".into()))
        }));

        let ticks = run_for(transport.clone(), 3, Duration::from_secs(1)).await;

        assert!(ticks > 1, "ticks={ticks}");
        assert_eq!(transport.len() as u64, ticks);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_keeps_going_after_error_statuses() {
        let transport = Arc::new(SimulatorTransport::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
        ));

        let ticks = run_for(transport.clone(), 4, Duration::from_secs(1)).await;

        assert!(ticks > 1, "ticks={ticks}");
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_cancelled_before_start_sends_nothing() {
        let transport = Arc::new(SimulatorTransport::new());
        let token = CancellationToken::new();
        token.cancel();

        let ticks = run_virtual_user(
            0,
            Arc::new(TrafficProfile::default()),
            transport.clone(),
            Rng::from_seed(5_u64),
            token,
        )
        .await;

        assert_eq!(ticks, 0);
        assert!(transport.is_empty());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_same_seed_same_requests() {
        let first = Arc::new(SimulatorTransport::new());
        let second = Arc::new(SimulatorTransport::new());

        run_for(first.clone(), 6, Duration::from_secs(1)).await;
        run_for(second.clone(), 6, Duration::from_secs(1)).await;

        let strip = |requests: Vec<Request>| {
            requests
                .into_iter()
                .map(|r| (r.method, r.path, r.body.map(|s| (s.cpu, s.rps))))
                .collect::<Vec<_>>()
        };

        assert_eq!(strip(first.requests()), strip(second.requests()));
    }
}
