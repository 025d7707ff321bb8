//! Retry policy, backoff, and the per-call retry state.

use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Growth of the wait between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * attempt`.
    Linear,
    /// `base * 2^(attempt - 1)`.
    #[default]
    Exponential,
}

/// Invalid retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Attempts must be at least 1")]
    InvalidAttempts,
}

/// Caller-supplied retry predicate, consulted for non-validation errors.
pub type RetryPredicate = Arc<dyn Fn(&ApiError) -> bool + Send + Sync>;

/// How many times to attempt a request and how long to wait in between.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    backoff: Backoff,
    should_retry: Option<RetryPredicate>,
}

impl RetryPolicy {
    /// Checked constructor.
    pub fn new(max_attempts: u32, base_delay_ms: u64, backoff: Backoff) -> Result<Self, PolicyError> {
        let policy = Self {
            max_attempts,
            base_delay_ms,
            backoff,
            should_retry: None,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Exponential backoff with the given attempt cap and base delay.
    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Result<Self, PolicyError> {
        Self::new(max_attempts, base_delay_ms, Backoff::Exponential)
    }

    /// Linear backoff with the given attempt cap and base delay.
    pub fn linear(max_attempts: u32, base_delay_ms: u64) -> Result<Self, PolicyError> {
        Self::new(max_attempts, base_delay_ms, Backoff::Linear)
    }

    /// Replace the attempt cap. Not checked until [`RetryPolicy::validate`];
    /// the executor reports a bad cap as a validation error.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Replace the base delay.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Replace the backoff shape.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Override the default retry eligibility. Never consulted for
    /// validation errors.
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ApiError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Reject a policy allowing fewer than one attempt.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts < 1 {
            return Err(PolicyError::InvalidAttempts);
        }
        Ok(())
    }

    /// Attempt cap, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the second attempt.
    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    /// How the delay grows.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Whether a request that failed on `attempt` with `error` should be
    /// attempted again.
    pub fn should_retry(&self, attempt: u32, error: &ApiError) -> bool {
        if attempt >= self.max_attempts || error.is_validation() {
            return false;
        }

        match &self.should_retry {
            Some(predicate) => predicate(error),
            None => error.is_transient(),
        }
    }

    /// Wait before the attempt following `attempt`. Attempt 0 waits nothing.
    ///
    /// Saturates at `u64::MAX` milliseconds instead of overflowing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let ms = match self.backoff {
            Backoff::Linear => self.base_delay_ms.saturating_mul(u64::from(attempt)),
            Backoff::Exponential => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                self.base_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    /// Three attempts, exponential backoff from one second.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff: Backoff::Exponential,
            should_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("backoff", &self.backoff)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Outcome of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    Stop,
}

/// Attempt counter for one request.
///
/// Without a policy the request gets exactly one attempt.
#[derive(Debug)]
pub struct RetryState<'p> {
    policy: Option<&'p RetryPolicy>,
    attempt: u32,
}

impl<'p> RetryState<'p> {
    /// Create a new state at attempt 1; `None` allows a single attempt.
    pub fn new(policy: Option<&'p RetryPolicy>) -> Self {
        Self { policy, attempt: 1 }
    }

    /// The attempt currently in flight, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempt cap; 1 without a policy.
    pub fn max_attempts(&self) -> u32 {
        self.policy.map_or(1, RetryPolicy::max_attempts)
    }

    /// Record that the current attempt failed with `error` and decide what
    /// happens next.
    pub fn on_failure(&mut self, error: &ApiError) -> RetryDecision {
        let Some(policy) = self.policy else {
            return RetryDecision::Stop;
        };

        if !policy.should_retry(self.attempt, error) {
            return RetryDecision::Stop;
        }

        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        RetryDecision::Retry {
            attempt: self.attempt,
            delay,
        }
    }
}

/// Suspends the calling task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
