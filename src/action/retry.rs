//! Retry ceiling and backoff for resubmitted requests.
//!
//! The adapter never retries on its own. A state that decides to resubmit
//! after an abort asks the client's policy first; the policy either grants
//! the attempt (with the delay the caller should wait) or reports that the
//! ceiling has been reached.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Raised when a resubmission would exceed the policy's ceiling.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetryError {
    #[error("Retry ceiling reached ({max} attempts, {attempts} already made)")]
    Exhausted { max: usize, attempts: usize },
}

/// Delay between consecutive attempts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    None,
    Fixed {
        delay_ms: u64,
    },
    Exponential {
        base_ms: u64,
        max_ms: u64,
    },
}

impl Backoff {
    /// Delay before retry number `retry` (1 = first resubmission).
    pub fn delay(&self, retry: usize) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Backoff::Exponential { base_ms, max_ms } => {
                let shift = retry.saturating_sub(1).min(32) as u32;
                let delay = base_ms.saturating_mul(1_u64 << shift);
                Duration::from_millis(delay.min(*max_ms))
            }
        }
    }
}

/// Granted resubmission.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryDecision {
    /// Attempt number the resubmission will be (the first send is 1).
    pub attempt: usize,
    /// How long the caller should wait before resubmitting.
    pub delay: Duration,
}

/// Ceiling and backoff for one client.
///
/// # Example
///
/// ```rust
/// use orthos::action::{Backoff, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .max_attempts(3)
///     .backoff(Backoff::Fixed { delay_ms: 250 });
///
/// let decision = policy.check(1).unwrap();
/// assert_eq!(decision.attempt, 2);
/// assert_eq!(decision.delay, Duration::from_millis(250));
///
/// assert!(policy.check(3).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    max_attempts: Option<usize>,
    backoff: Backoff,
}

/// Attempts allowed by [`RetryPolicy::new`], the first send included.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            backoff: Backoff::None,
        }
    }

    /// No ceiling. Resubmission can then go on forever; callers opting into
    /// this must bound it themselves.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::None,
        }
    }

    /// Total attempts allowed, the first send included.
    pub fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = Some(n);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.max_attempts
    }

    pub fn backoff_strategy(&self) -> &Backoff {
        &self.backoff
    }

    /// Decide on another attempt after `attempts` have been made.
    pub fn check(&self, attempts: usize) -> Result<RetryDecision, RetryError> {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return Err(RetryError::Exhausted { max, attempts });
            }
        }
        Ok(RetryDecision {
            attempt: attempts + 1,
            delay: self.backoff.delay(attempts),
        })
    }
}
