//! Behavior-driven tests for the per-provider resilience stack
//!
//! These tests verify HOW calls to an unreliable provider are isolated, paced
//! and retried: circuit breaker transitions, rate limiter spacing and
//! concurrency, and retry exhaustion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use urbanpulse_core::{
    fetch_json_with_retry, Backoff, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    HttpRequest, RateLimiter, RateLimiterConfig, RetryConfig, ScriptedHttpClient, ScriptedReply,
    SourceError, SourceErrorKind,
};

fn breaker(reset_timeout: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        "cpcb",
        CircuitBreakerConfig {
            failure_threshold: 2,
            reset_timeout,
            half_open_max_probes: 1,
        },
    )
}

async fn fail(breaker: &CircuitBreaker) -> SourceError {
    breaker
        .execute(|| async { Err::<(), _>(SourceError::unavailable("upstream timeout")) })
        .await
        .expect_err("operation fails")
}

// =============================================================================
// Circuit Breaker
// =============================================================================

#[tokio::test]
async fn when_failures_reach_threshold_breaker_short_circuits_without_calling_upstream() {
    // Given: A breaker with threshold 2 that has seen two consecutive failures
    let breaker = breaker(Duration::from_secs(60));
    fail(&breaker).await;
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // When: A third call arrives inside the reset window
    let invoked = AtomicUsize::new(0);
    let error = breaker
        .execute(|| async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok::<_, SourceError>(())
        })
        .await
        .expect_err("circuit is open");

    // Then: The operation never runs and the caller sees a circuit-open error
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(error.kind(), SourceErrorKind::CircuitOpen);
    assert_eq!(error.message(), "circuit 'cpcb' is open");
}

#[tokio::test]
async fn when_reset_timeout_elapses_one_successful_probe_closes_the_circuit() {
    // Given: An open breaker whose reset window has passed
    let breaker = breaker(Duration::from_millis(40));
    fail(&breaker).await;
    fail(&breaker).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    // When: The probe succeeds
    let value = breaker
        .execute(|| async { Ok::<_, SourceError>(42) })
        .await
        .expect("probe is admitted");

    // Then: The circuit is closed again with a clean failure count
    assert_eq!(value, 42);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);
    assert_eq!(breaker.snapshot().half_open_probes_used, 0);
}

#[tokio::test]
async fn when_probe_fails_circuit_reopens_and_restarts_the_timer() {
    // Given: An open breaker whose reset window has passed
    let breaker = breaker(Duration::from_millis(40));
    fail(&breaker).await;
    fail(&breaker).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    // When: The probe fails
    let error = fail(&breaker).await;

    // Then: The probe's own error is surfaced and the circuit is open again
    assert_eq!(error.kind(), SourceErrorKind::Unavailable);
    assert_eq!(breaker.state(), CircuitState::Open);

    // And: An immediate follow-up is rejected because the timer restarted
    let follow_up = breaker
        .execute(|| async { Ok::<_, SourceError>(()) })
        .await
        .expect_err("timer restarted");
    assert_eq!(follow_up.kind(), SourceErrorKind::CircuitOpen);
}

// =============================================================================
// Rate Limiter
// =============================================================================

#[tokio::test]
async fn when_tasks_are_queued_dispatch_starts_are_spaced_by_min_interval() {
    // Given: A limiter allowing one task every 50ms
    let limiter = RateLimiter::new(
        "test",
        RateLimiterConfig {
            min_interval: Duration::from_millis(50),
            max_concurrent: 1,
        },
    );
    let starts = Arc::new(Mutex::new(Vec::new()));

    // When: Five tasks are scheduled at once
    let mut handles = Vec::new();
    for _ in 0..5 {
        let limiter = limiter.clone();
        let starts = Arc::clone(&starts);
        handles.push(tokio::spawn(async move {
            limiter
                .schedule(|| async {
                    starts.lock().expect("starts lock").push(Instant::now());
                    Ok::<_, SourceError>(())
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task joins").expect("task succeeds");
    }

    // Then: Every consecutive start is at least ~50ms after the previous one
    let starts = starts.lock().expect("starts lock");
    assert_eq!(starts.len(), 5);
    for pair in starts.windows(2) {
        let delta = pair[1].duration_since(pair[0]);
        assert!(delta >= Duration::from_millis(45), "delta={delta:?}");
    }
}

#[tokio::test]
async fn when_concurrency_cap_is_two_no_more_than_two_tasks_run_together() {
    // Given: A limiter with two concurrency slots and negligible spacing
    let limiter = RateLimiter::new(
        "test",
        RateLimiterConfig {
            min_interval: Duration::from_millis(1),
            max_concurrent: 2,
        },
    );
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    // When: Eight slow tasks are scheduled
    let mut handles = Vec::new();
    for _ in 0..8 {
        let limiter = limiter.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            limiter
                .schedule(|| async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, SourceError>(())
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("task joins").expect("task succeeds");
    }

    // Then: At most two were observed running at the same time
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(limiter.pending(), 0);
}

// =============================================================================
// Retrying Fetcher
// =============================================================================

fn quick_retry(attempts: u32) -> RetryConfig {
    RetryConfig {
        attempts,
        backoff: Backoff {
            base: Duration::from_millis(10),
            max: Duration::from_millis(40),
            max_jitter: Duration::from_millis(5),
        },
        ..RetryConfig::default()
    }
}

#[tokio::test]
async fn when_endpoint_recovers_after_two_503s_fetch_succeeds() {
    // Given: An endpoint that answers 503 twice, then 200
    let client = ScriptedHttpClient::new().route_sequence(
        "aqi.test",
        [
            ScriptedReply::status(503, ""),
            ScriptedReply::status(503, ""),
            ScriptedReply::json(r#"{"records":[]}"#),
        ],
    );

    // When: The fetcher runs with two retries
    let started = Instant::now();
    let body = fetch_json_with_retry(&client, HttpRequest::get("https://aqi.test/r"), &quick_retry(2))
        .await
        .expect("third attempt succeeds");

    // Then: Three requests were made with backoff of at least 10ms + 20ms
    assert!(body["records"].is_array());
    assert_eq!(client.request_count("aqi.test"), 3);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn when_endpoint_never_recovers_error_surfaces_after_all_attempts() {
    // Given: An endpoint that always answers 502
    let client = ScriptedHttpClient::new().route("aqi.test", ScriptedReply::status(502, ""));

    // When: The fetcher runs with three retries
    let error = fetch_json_with_retry(&client, HttpRequest::get("https://aqi.test/r"), &quick_retry(3))
        .await
        .expect_err("never recovers");

    // Then: Exactly attempts + 1 requests were made and the last status is reported
    assert_eq!(client.request_count("aqi.test"), 4);
    assert_eq!(error.status(), Some(502));
}
