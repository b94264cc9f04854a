//! Per-provider circuit breaker.
//!
//! ```text
//! CLOSED ──(consecutive failures >= threshold)──▶ OPEN
//! OPEN ──(reset timeout elapsed, next call)──▶ HALF_OPEN
//! HALF_OPEN ──(probe succeeds)──▶ CLOSED
//! HALF_OPEN ──(probe fails)──▶ OPEN (timer restarts)
//! ```
//!
//! Failures are counted consecutively with no sliding window: a failure from
//! long ago still counts toward the threshold until a success resets it.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{SourceError, UtcDateTime};

/// Runtime circuit state for provider upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_probes: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_probes: 1,
        }
    }
}

/// Read-only view of a breaker, exposed to operational endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub successes: u64,
    pub last_failure_at: Option<UtcDateTime>,
    pub last_state_change_at: UtcDateTime,
    pub half_open_probes_used: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub half_open_max_probes: u32,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    successes: u64,
    last_failure_at: Option<UtcDateTime>,
    state_changed: Instant,
    state_changed_at: UtcDateTime,
    half_open_probes_used: u32,
}

impl CircuitInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            successes: 0,
            last_failure_at: None,
            state_changed: Instant::now(),
            state_changed_at: UtcDateTime::now(),
            half_open_probes_used: 0,
        }
    }
}

/// Thread-safe circuit breaker guarding calls to one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(CircuitInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Runs `operation` through the breaker.
    ///
    /// While OPEN (and in HALF_OPEN once the probe budget is spent) the call
    /// fails with a circuit-open [`SourceError`] and `operation` is never
    /// invoked. Errors returned by `operation` are passed through unchanged.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let is_probe = self.admit()?;
        let guard = ProbeGuard {
            breaker: self,
            armed: is_probe,
        };

        let outcome = operation().await;
        guard.disarm();

        match &outcome {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        outcome
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            successes: inner.successes,
            last_failure_at: inner.last_failure_at,
            last_state_change_at: inner.state_changed_at,
            half_open_probes_used: inner.half_open_probes_used,
            failure_threshold: self.config.failure_threshold,
            reset_timeout_ms: duration_ms(self.config.reset_timeout),
            half_open_max_probes: self.config.half_open_max_probes,
        }
    }

    /// Decides whether a call may proceed; `Ok(true)` marks a half-open probe.
    fn admit(&self) -> Result<bool, SourceError> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open
            && inner.state_changed.elapsed() >= self.config.reset_timeout
        {
            self.transition(&mut inner, CircuitState::HalfOpen);
        }

        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => Err(SourceError::circuit_open(&self.name)),
            CircuitState::HalfOpen => {
                if inner.half_open_probes_used >= self.config.half_open_max_probes {
                    return Err(SourceError::circuit_open(&self.name));
                }
                inner.half_open_probes_used += 1;
                Ok(true)
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        inner.successes = inner.successes.saturating_add(1);

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Closed),
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure_at = Some(UtcDateTime::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.state_changed = Instant::now();
        inner.state_changed_at = UtcDateTime::now();
        inner.half_open_probes_used = 0;
        if to == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }

        match to {
            CircuitState::Open => {
                tracing::warn!(circuit = %self.name, %from, %to, "circuit state changed")
            }
            _ => tracing::info!(circuit = %self.name, %from, %to, "circuit state changed"),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}

/// Records a failed probe if the probing future is dropped before it settles,
/// so HALF_OPEN cannot be left with its budget consumed and no outcome.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(circuit = %self.breaker.name, "half-open probe cancelled");
            self.breaker.record_failure();
        }
    }
}

/// Registry of breakers keyed by provider name.
///
/// Owned by the composition root and handed to adapters explicitly.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the breaker registered under `name`, creating it with `config`
    /// on first use. Later calls ignore `config`.
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .expect("circuit registry lock is not poisoned");
        Arc::clone(
            breakers
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config))),
        )
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .lock()
            .expect("circuit registry lock is not poisoned")
            .get(name)
            .cloned()
    }

    pub fn snapshots(&self) -> BTreeMap<String, CircuitSnapshot> {
        let breakers = self
            .breakers
            .lock()
            .expect("circuit registry lock is not poisoned");
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
