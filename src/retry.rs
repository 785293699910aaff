//! Retry logic with exponential backoff
//!
//! Transient remote failures are a policy concern of the HTTP layer: the
//! orchestration core only ever sees a durable failure after this module has
//! exhausted its attempts. The module also provides the consecutive-failure
//! circuit breaker used by the Arr history client so that probes against a
//! down service stop generating network traffic (and noise) until a cooldown
//! elapses.

use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RetryConfig;
use crate::error::Error;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, connection reset) should
/// return `true`. Permanent failures (bad request, not found, invalid config)
/// should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Retryable HTTP status codes: request timeout, too many requests, and the 5xx family
fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| is_retryable_status(s.as_u16()))
            }
            Error::Api(e) => is_retryable_status(e.status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Run `operation` with exponential backoff until it succeeds, returns a
/// non-retryable error, or the configured attempt budget is exhausted.
///
/// The last error is returned when all attempts fail.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: IsRetryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = Duration::from_millis(config.initial_backoff_ms);
    let max_backoff = Duration::from_millis(config.max_backoff_ms);

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = apply_jitter(backoff, config.jitter);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                backoff = backoff
                    .mul_f64(config.backoff_multiplier)
                    .min(max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop always returns from its final attempt")
}

/// Apply up to +/-25% random jitter to a backoff delay.
fn apply_jitter(delay: Duration, jitter: bool) -> Duration {
    if !jitter {
        return delay;
    }
    let factor = rand::thread_rng().gen_range(0.75..1.25);
    delay.mul_f64(factor)
}

/// Number of consecutive failures that opens the breaker
const BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// How long the breaker stays open before allowing a half-open probe
const BREAKER_COOLDOWN: Duration = Duration::from_secs(60);

/// Consecutive-failure circuit breaker
///
/// Opens after [`BREAKER_FAILURE_THRESHOLD`] consecutive failures and rejects
/// calls for [`BREAKER_COOLDOWN`]; after the cooldown a single probe is let
/// through (half-open) and a success fully closes the breaker again.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    threshold: u32,
    cooldown: Duration,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BREAKER_FAILURE_THRESHOLD, BREAKER_COOLDOWN)
    }
}

impl CircuitBreaker {
    /// Create a breaker with an explicit threshold and cooldown.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            threshold,
            cooldown,
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True while the breaker is open and calls should be rejected.
    pub fn is_open(&self) -> bool {
        let mut state = self.guard();
        match state.open_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // Cooldown elapsed: half-open, let one probe through
                state.open_until = None;
                false
            }
            None => false,
        }
    }

    /// Record a successful call, closing the breaker.
    pub fn record_success(&self) {
        let mut state = self.guard();
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    /// Record a failed call, opening the breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut state = self.guard();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
        }
    }
}
