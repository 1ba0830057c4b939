//! Bounded exponential backoff.
//!
//! [`BackoffPolicy`] is a plain value so each component can carry its own
//! schedule, and [`retry`] drives an operation through it using an injected
//! [`Clock`] for the waits.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Retry schedule for transient failures.
///
/// The wait before retry `n` (1-based) is `base_delay * 2^(n-1)` capped at
/// `max_delay`, raised to any server-requested delay, and clipped so the sum
/// of all waits never exceeds `max_total_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_total_wait: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            max_total_wait: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Uncapped-by-budget delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Classification hook for errors driven through [`retry`].
pub trait Retryable {
    fn is_transient(&self) -> bool;

    /// Server-requested wait, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Failure that retrying cannot fix
    #[error("{0}")]
    Permanent(E),

    /// Transient failures used up the attempts or the wait budget
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) => e,
            Self::Exhausted { last, .. } => last,
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy is spent.
///
/// The closure receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    policy: &BackoffPolicy,
    clock: &dyn Clock,
    operation: &str,
    mut attempt: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut waited = Duration::ZERO;
    let mut number = 0u32;

    loop {
        number += 1;
        let error = match attempt(number).await {
            Ok(value) => {
                if number > 1 {
                    debug!(operation, attempts = number, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) => e,
        };

        let remaining = policy.max_total_wait.saturating_sub(waited);
        if number >= max_attempts || remaining.is_zero() {
            warn!(
                operation,
                attempts = number,
                error = %error,
                "Giving up after transient failures"
            );
            return Err(RetryError::Exhausted {
                attempts: number,
                last: error,
            });
        }

        let mut delay = policy.delay_for(number);
        if let Some(requested) = error.retry_after() {
            delay = delay.max(requested);
        }
        let delay = delay.min(remaining);

        warn!(
            operation,
            attempt = number,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, backing off"
        );
        clock.sleep(delay).await;
        waited += delay;
    }
}
