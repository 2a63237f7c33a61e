//! Bounded linear-backoff retry executor for idempotent reads.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use feedline_types::UpstreamError;

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_SCALE_FACTOR: f64 = 0.25;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        UpstreamError::is_retryable(self)
    }
}

/// Attempt bound and delay schedule.
///
/// The delay after failed attempt `n` (1-based) is
/// `base_delay * scale_factor * n`: 15 s, 30 s, 45 s, ... with the defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub scale_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            scale_factor: DEFAULT_SCALE_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.base_delay.as_secs_f64() * self.scale_factor.max(0.0) * f64::from(attempt);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Successful outcome of [`with_retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Delays slept between attempts, in order.
    pub delays: Vec<Duration>,
}

/// Terminal failure of [`with_retry`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryError<E: fmt::Display> {
    #[error("retries exhausted after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: E },
    #[error("non-retryable failure on attempt {attempts}: {error}")]
    Aborted { attempts: u32, error: E },
}

impl<E: fmt::Display> RetryError<E> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    /// The error from the final attempt.
    #[must_use]
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or `max_attempts` is reached.
///
/// Attempts run strictly one after another. Every failure is logged before
/// sleeping; there is no sleep after the final attempt.
///
/// # Errors
///
/// Returns [`RetryError::Aborted`] on the first non-retryable error and
/// [`RetryError::Exhausted`] once every attempt has failed.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<Retried<T>, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = Vec::new();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                    delays,
                });
            }
            Err(error) if !error.is_retryable() => {
                tracing::error!(label, attempt, error = %error, "Non-retryable error, giving up");
                return Err(RetryError::Aborted {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    label,
                    attempt,
                    max_attempts,
                    error = %error,
                    "Max attempts exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %error,
                    "Retryable error, will retry"
                );
                tokio::time::sleep(delay).await;
                delays.push(delay);
            }
        }
    }
}
