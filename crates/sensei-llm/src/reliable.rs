//! Reliability wrapper around a provider: bounded timeout, exponential
//! backoff with jitter for retryable errors, and a consecutive-failure
//! circuit breaker.
//!
//! Quota errors pass straight through. Retrying them would burn more of a
//! budget that is already spent, and the engine routes them to fallback.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use sensei_core::{LlmProvider, SenseiError};

/// Retry parameters.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_factor: 0.2,
        }
    }
}

/// Exponential backoff with symmetric jitter.
///
/// `min(max_delay, base * 2^attempt) * (1 + (random*2-1) * jitter)`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn backoff_delay_ms(attempt: u32, config: &RetryConfig, random: f64) -> u64 {
    let exponential = config.base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(config.max_delay_ms);
    let jitter = 1.0 + (random * 2.0 - 1.0) * config.jitter_factor;
    ((capped as f64) * jitter).round().max(0.0) as u64
}

/// Consecutive failures before the circuit opens.
const CIRCUIT_THRESHOLD: u32 = 3;
/// How long an open circuit stays open.
const CIRCUIT_COOLDOWN: Duration = Duration::from_secs(30);
/// Per-call deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

pub struct ReliableProvider {
    inner: Arc<dyn LlmProvider>,
    config: RetryConfig,
    timeout: Duration,
    consecutive_failures: AtomicU32,
    open_until: Mutex<Option<Instant>>,
}

impl ReliableProvider {
    pub fn new(inner: Arc<dyn LlmProvider>) -> Self {
        Self::with_config(inner, RetryConfig::default(), DEFAULT_TIMEOUT)
    }

    pub fn with_config(inner: Arc<dyn LlmProvider>, config: RetryConfig, timeout: Duration) -> Self {
        Self {
            inner,
            config,
            timeout,
            consecutive_failures: AtomicU32::new(0),
            open_until: Mutex::new(None),
        }
    }

    fn circuit_open(&self) -> bool {
        let mut open_until = self.open_until.lock();
        match *open_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // Cooldown elapsed, half-open: allow the next attempt through
                *open_until = None;
                self.consecutive_failures.store(0, Ordering::SeqCst);
                false
            }
            None => false,
        }
    }

    fn note_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= CIRCUIT_THRESHOLD {
            warn!(failures, cooldown_secs = CIRCUIT_COOLDOWN.as_secs(), "circuit opened");
            *self.open_until.lock() = Some(Instant::now() + CIRCUIT_COOLDOWN);
        }
    }

    fn note_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    async fn attempt(&self, prompt: &str) -> Result<String, SenseiError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(SenseiError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl LlmProvider for ReliableProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, prompt: &str) -> Result<String, SenseiError> {
        if self.circuit_open() {
            return Err(SenseiError::NetworkError("circuit breaker open".into()));
        }

        let mut attempt = 0u32;
        loop {
            match self.attempt(prompt).await {
                Ok(text) => {
                    self.note_success();
                    return Ok(text);
                }
                Err(err) if err.is_quota() => {
                    // Not a provider health problem, leave the circuit alone
                    return Err(err);
                }
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        self.note_failure();
                        return Err(err);
                    }
                    let random = rand::thread_rng().gen::<f64>();
                    let delay = backoff_delay_ms(attempt, &self.config, random);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay,
                        kind = err.error_kind(),
                        "retrying provider call"
                    );
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn quick_config() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        }
    }

    fn wrap(mock: MockProvider) -> ReliableProvider {
        ReliableProvider::with_config(Arc::new(mock), quick_config(), Duration::from_secs(5))
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter_factor: 0.0,
        };
        assert_eq!(backoff_delay_ms(0, &config, 0.5), 100);
        assert_eq!(backoff_delay_ms(1, &config, 0.5), 200);
        assert_eq!(backoff_delay_ms(2, &config, 0.5), 400);
        assert_eq!(backoff_delay_ms(10, &config, 0.5), 1_000);
    }

    #[test]
    fn backoff_jitter_bounds() {
        let config = RetryConfig {
            max_retries: 1,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter_factor: 0.2,
        };
        assert_eq!(backoff_delay_ms(0, &config, 0.0), 800);
        assert_eq!(backoff_delay_ms(0, &config, 1.0), 1_200);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mock = MockProvider::new();
        mock.push_err(SenseiError::ServerError { status: 500, body: "boom".into() });
        mock.push_err(SenseiError::NetworkError("reset".into()));
        mock.push_ok("recovered");

        let provider = wrap(mock);
        let text = provider.complete("p").await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn quota_errors_are_not_retried() {
        let mock = MockProvider::new();
        mock.push_err(SenseiError::QuotaExhausted { retry_after: None });
        mock.push_ok("should never be reached");

        let mock = Arc::new(mock);
        let provider = ReliableProvider::with_config(
            mock.clone(),
            quick_config(),
            Duration::from_secs(5),
        );
        let err = provider.complete("p").await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let mock = MockProvider::new();
        mock.push_err(SenseiError::AuthenticationFailed("bad key".into()));
        mock.push_ok("unreachable");

        let mock = Arc::new(mock);
        let provider = ReliableProvider::with_config(
            mock.clone(),
            quick_config(),
            Duration::from_secs(5),
        );
        assert!(provider.complete("p").await.is_err());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn retries_exhaust_then_fail() {
        let mock = MockProvider::new();
        for _ in 0..5 {
            mock.push_err(SenseiError::ServerError { status: 503, body: "down".into() });
        }

        let mock = Arc::new(mock);
        let provider = ReliableProvider::with_config(
            mock.clone(),
            quick_config(),
            Duration::from_secs(5),
        );
        assert!(provider.complete("p").await.is_err());
        // Initial attempt plus two retries
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_failures() {
        let mock = MockProvider::new();
        // Each complete() makes 3 attempts; 3 failed completes trip the circuit
        for _ in 0..9 {
            mock.push_err(SenseiError::ServerError { status: 500, body: "down".into() });
        }

        let mock = Arc::new(mock);
        let provider = ReliableProvider::with_config(
            mock.clone(),
            quick_config(),
            Duration::from_secs(5),
        );
        for _ in 0..3 {
            assert!(provider.complete("p").await.is_err());
        }
        let calls_before = mock.calls();

        // Circuit now open: fails fast without touching the inner provider
        let err = provider.complete("p").await.unwrap_err();
        assert!(matches!(err, SenseiError::NetworkError(_)));
        assert_eq!(mock.calls(), calls_before);
    }
}
