use std::sync::Arc;

use serde_json::Value;

use crate::circuit_breaker::CircuitBreaker;
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::retry::{fetch_json_with_retry, RetryConfig};
use crate::throttling::RateLimiter;
use crate::{ProviderId, SourceError};

/// Outbound call path shared by every provider adapter.
///
/// A request waits for its turn in the provider's [`RateLimiter`], then runs
/// through the provider's [`CircuitBreaker`], which wraps the whole retry
/// sequence. Exhausted retries count as one breaker failure.
#[derive(Clone)]
pub struct ProviderTransport {
    policy: ProviderPolicy,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    rate_limiter: RateLimiter,
    retry: RetryConfig,
}

impl ProviderTransport {
    pub fn new(
        policy: ProviderPolicy,
        http_client: Arc<dyn HttpClient>,
        circuit_breaker: Arc<CircuitBreaker>,
        retry: RetryConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::from_policy(&policy);
        Self {
            policy,
            http_client,
            circuit_breaker,
            rate_limiter,
            retry,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.policy.provider_id
    }

    pub fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Sends `request` with the provider timeout applied to every attempt and
    /// decodes the body as JSON.
    pub async fn fetch_json(&self, request: HttpRequest) -> Result<Value, SourceError> {
        let timeout_ms = self.policy.timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        let request = request.with_timeout_ms(timeout_ms);

        self.rate_limiter
            .schedule(|| {
                self.circuit_breaker.execute(|| {
                    fetch_json_with_retry(self.http_client.as_ref(), request, &self.retry)
                })
            })
            .await
    }
}
