//! Retry logic with exponential backoff and jitter.

use std::time::Duration;

use serde_json::Value;

use crate::http_client::{HttpClient, HttpRequest};
use crate::SourceError;

/// Exponential backoff: `min(base * 2^attempt, max)` plus random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Cap applied before jitter is added.
    pub max: Duration,
    /// Upper bound of the uniformly random offset added to every delay.
    pub max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(5),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl Backoff {
    /// Capped exponential delay for a 0-based retry index, without jitter.
    pub fn base_delay(self, attempt: u32) -> Duration {
        let scale = 2_f64.powi(attempt.min(i32::MAX as u32) as i32);
        let seconds = self.base.as_secs_f64() * scale;
        Duration::from_secs_f64(seconds.min(self.max.as_secs_f64()))
    }

    /// Delay before the retry with the given 0-based index.
    pub fn delay(self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis().min(u128::from(u64::MAX)) as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..=jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first try. Total attempts = `attempts + 1`.
    pub attempts: u32,
    pub backoff: Backoff,
    /// HTTP statuses that trigger a retry.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn exponential(attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            attempts,
            backoff: Backoff {
                base,
                max,
                ..Backoff::default()
            },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Issues `request`, retrying timeouts, transport errors and retryable
/// statuses with backoff, and decodes the body as JSON.
///
/// Each attempt is bounded by `request.timeout_ms`. Statuses outside
/// `retry_on_status` fail immediately. After the last attempt the final error
/// is returned.
pub async fn fetch_json_with_retry(
    client: &dyn HttpClient,
    request: HttpRequest,
    config: &RetryConfig,
) -> Result<Value, SourceError> {
    let url = redact_url(&request.url);
    let mut attempt = 0_u32;

    loop {
        match attempt_once(client, request.clone(), config).await {
            Ok(value) => return Ok(value),
            Err(error) if error.retryable() && attempt < config.attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    url = %url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                tracing::warn!(
                    url = %url,
                    attempts = attempt + 1,
                    error = %error.message(),
                    "request failed"
                );
                return Err(error);
            }
        }
    }
}

async fn attempt_once(
    client: &dyn HttpClient,
    request: HttpRequest,
    config: &RetryConfig,
) -> Result<Value, SourceError> {
    let timeout = Duration::from_millis(request.timeout_ms);
    let response = match tokio::time::timeout(timeout, client.execute(request)).await {
        Err(_) => {
            return Err(SourceError::unavailable(format!(
                "request timed out after {}ms",
                timeout.as_millis()
            )))
        }
        Ok(Err(error)) => {
            return Err(SourceError::unavailable(format!(
                "transport error: {}",
                error.message()
            ))
            .with_retryable(error.retryable()))
        }
        Ok(Ok(response)) => response,
    };

    if !response.is_success() {
        let status = response.status;
        return Err(SourceError::upstream_status(
            status,
            config.should_retry_status(status),
            format!("upstream returned status {status}"),
        ));
    }

    serde_json::from_str(&response.body)
        .map_err(|e| SourceError::invalid_response(format!("response is not valid JSON: {e}")))
}

/// Strips the query string and fragment, which carry API keys.
pub fn redact_url(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, ScriptedHttpClient, ScriptedReply};
    use crate::SourceErrorKind;
    use std::time::Instant;

    fn fast_config(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            backoff: Backoff {
                base: Duration::from_millis(1),
                max: Duration::from_millis(5),
                max_jitter: Duration::ZERO,
            },
            ..RetryConfig::default()
        }
    }

    #[test]
    fn base_delay_is_exponential_and_capped() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_jitter: Duration::ZERO,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn jitter_is_additive_and_bounded() {
        let backoff = Backoff {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            max_jitter: Duration::from_millis(100),
        };

        for _ in 0..20 {
            for attempt in 0..6 {
                let floor = backoff.base_delay(attempt);
                let delay = backoff.delay(attempt);
                assert!(delay >= floor, "attempt={attempt} delay={delay:?}");
                assert!(
                    delay <= floor + Duration::from_millis(100),
                    "attempt={attempt} delay={delay:?}"
                );
            }
        }
    }

    #[test]
    fn default_config_retries_rate_limits_and_server_errors() {
        let config = RetryConfig::default();

        assert_eq!(config.attempts, 2);
        for status in [429, 500, 502, 503, 504] {
            assert!(config.should_retry_status(status));
        }
        assert!(!config.should_retry_status(400));
        assert!(!config.should_retry_status(404));
    }

    #[test]
    fn redacts_query_string() {
        assert_eq!(
            redact_url("https://api.test/resource/abc?api-key=secret&format=json"),
            "https://api.test/resource/abc"
        );
        assert_eq!(redact_url("https://api.test/plain"), "https://api.test/plain");
    }

    #[tokio::test]
    async fn recovers_after_two_retryable_statuses() {
        let client = ScriptedHttpClient::new().route_sequence(
            "flaky.test",
            [
                ScriptedReply::status(503, ""),
                ScriptedReply::status(503, ""),
                ScriptedReply::json(r#"{"ok":true}"#),
            ],
        );

        let value = fetch_json_with_retry(
            &client,
            HttpRequest::get("https://flaky.test/data"),
            &fast_config(2),
        )
        .await
        .expect("third attempt succeeds");

        assert_eq!(value["ok"], true);
        assert_eq!(client.request_count("flaky.test"), 3);
    }

    #[tokio::test]
    async fn retry_delays_follow_backoff() {
        let client = ScriptedHttpClient::new().route_sequence(
            "slow.test",
            [
                ScriptedReply::status(503, ""),
                ScriptedReply::status(503, ""),
                ScriptedReply::json("{}"),
            ],
        );
        let config = RetryConfig {
            attempts: 2,
            backoff: Backoff {
                base: Duration::from_millis(20),
                max: Duration::from_secs(1),
                max_jitter: Duration::from_millis(10),
            },
            ..RetryConfig::default()
        };

        let started = Instant::now();
        fetch_json_with_retry(&client, HttpRequest::get("https://slow.test"), &config)
            .await
            .expect("recovers");
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(60), "elapsed={elapsed:?}");
        assert!(elapsed < Duration::from_secs(1), "elapsed={elapsed:?}");
    }

    #[tokio::test]
    async fn permanent_failure_surfaces_after_all_attempts() {
        let client =
            ScriptedHttpClient::new().route("down.test", ScriptedReply::status(503, "busy"));

        let error = fetch_json_with_retry(
            &client,
            HttpRequest::get("https://down.test"),
            &fast_config(3),
        )
        .await
        .expect_err("never recovers");

        assert_eq!(error.kind(), SourceErrorKind::UpstreamStatus);
        assert_eq!(error.status(), Some(503));
        assert_eq!(client.request_count("down.test"), 4);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let client =
            ScriptedHttpClient::new().route("missing.test", ScriptedReply::status(404, ""));

        let error = fetch_json_with_retry(
            &client,
            HttpRequest::get("https://missing.test"),
            &fast_config(3),
        )
        .await
        .expect_err("404 is final");

        assert_eq!(error.status(), Some(404));
        assert!(!error.retryable());
        assert_eq!(client.request_count("missing.test"), 1);
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let client = ScriptedHttpClient::new().route_sequence(
            "hang.test",
            [
                ScriptedReply::json("{}").with_delay(Duration::from_millis(500)),
                ScriptedReply::json(r#"{"late":false}"#),
            ],
        );

        let value = fetch_json_with_retry(
            &client,
            HttpRequest::get("https://hang.test").with_timeout_ms(20),
            &fast_config(1),
        )
        .await
        .expect("second attempt is fast");

        assert_eq!(value["late"], false);
        assert_eq!(client.request_count("hang.test"), 2);
    }

    #[tokio::test]
    async fn non_retryable_transport_error_is_not_retried() {
        let client = ScriptedHttpClient::new().route(
            "bad.test",
            ScriptedReply::error(HttpError::non_retryable("invalid request")),
        );

        let error = fetch_json_with_retry(&client, HttpRequest::get("https://bad.test"), &fast_config(3))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert_eq!(client.request_count("bad.test"), 1);
    }

    #[tokio::test]
    async fn invalid_json_is_not_retried() {
        let client = ScriptedHttpClient::new().route("html.test", ScriptedReply::json("<html>"));

        let error = fetch_json_with_retry(&client, HttpRequest::get("https://html.test"), &fast_config(3))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::InvalidResponse);
        assert_eq!(client.request_count("html.test"), 1);
    }
}
