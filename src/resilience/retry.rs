//! Bounded retry with backoff.
//!
//! A call moves through `Attempting(1) .. Attempting(N)` and ends `Succeeded` or
//! `Failed`. Only the final failure is surfaced, unmodified; earlier failures are
//! logged and recorded in the [`RetryReport`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Error, ErrorContext, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles per failed attempt, never exceeding `max_delay`.
    Exponential { max_delay: Duration },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Serializable retry settings, see [`RetryPolicy::from_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: BackoffKind,
    /// Cap for exponential backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
            backoff: BackoffKind::Fixed,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Attempting(u32),
    Succeeded,
    Failed,
}

/// Per-call bookkeeping. Lives for exactly one logical call.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    phase: RetryPhase,
    last_error: Option<String>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            phase: RetryPhase::Attempting(1),
            last_error: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Description of the most recent failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.phase = RetryPhase::Attempting(self.attempt);
        self.attempt
    }

    fn succeed(&mut self) {
        self.phase = RetryPhase::Succeeded;
    }

    /// Records a failure; returns whether another attempt is allowed.
    fn fail(&mut self, error: &Error) -> bool {
        self.last_error = Some(error.to_string());
        if self.attempt >= self.max_attempts || error.is_cancelled() {
            self.phase = RetryPhase::Failed;
            false
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    /// Delay slept after this attempt, if a retry followed.
    pub backoff: Option<Duration>,
}

#[derive(Debug)]
pub struct RetryReport<T> {
    pub result: Result<T>,
    pub attempts: Vec<AttemptRecord>,
}

impl<T> RetryReport<T> {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn backoff_count(&self) -> usize {
        self.attempts.iter().filter(|a| a.backoff.is_some()).count()
    }

    pub fn total_backoff(&self) -> Duration {
        self.attempts.iter().filter_map(|a| a.backoff).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; 0 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                max_delay: Duration::from_millis(config.max_delay_ms),
            },
        };
        Self::new(config.max_attempts, Duration::from_millis(config.delay_ms)).with_backoff(backoff)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                self.delay.saturating_mul(factor).min(max_delay)
            }
        }
    }

    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_recorded(cancel, op).await.result
    }

    /// Run `op` until it succeeds, the attempt budget is spent, or `cancel` fires.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn execute_recorded<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> RetryReport<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = RetryState::new(self.max_attempts);
        let mut attempts = Vec::new();

        loop {
            let attempt = state.begin();
            let result = if cancel.is_cancelled() {
                Err(cancelled(attempt))
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(cancelled(attempt)),
                    r = op(attempt) => r,
                }
            };

            let err = match result {
                Ok(value) => {
                    state.succeed();
                    debug!(attempt, max_attempts = self.max_attempts, outcome = "success", "attempt finished");
                    attempts.push(AttemptRecord {
                        attempt,
                        outcome: AttemptOutcome::Succeeded,
                        backoff: None,
                    });
                    return RetryReport {
                        result: Ok(value),
                        attempts,
                    };
                }
                Err(e) => e,
            };

            if err.is_cancelled() {
                state.fail(&err);
                info!(attempt, max_attempts = self.max_attempts, outcome = "cancelled", "attempt finished");
                attempts.push(AttemptRecord {
                    attempt,
                    outcome: AttemptOutcome::Cancelled,
                    backoff: None,
                });
                return RetryReport {
                    result: Err(err),
                    attempts,
                };
            }

            if !state.fail(&err) {
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    outcome = "failure",
                    error = %err,
                    "retry budget exhausted"
                );
                attempts.push(AttemptRecord {
                    attempt,
                    outcome: AttemptOutcome::Failed {
                        error: err.to_string(),
                    },
                    backoff: None,
                });
                return RetryReport {
                    result: Err(err),
                    attempts,
                };
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                outcome = "failure",
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "attempt failed; retrying"
            );
            attempts.push(AttemptRecord {
                attempt,
                outcome: AttemptOutcome::Failed {
                    error: err.to_string(),
                },
                backoff: Some(delay),
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(attempt, "cancelled during backoff");
                    return RetryReport {
                        result: Err(cancelled(attempt)),
                        attempts,
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn cancelled(attempt: u32) -> Error {
    Error::cancelled(
        ErrorContext::new()
            .with_source("retry_policy")
            .with_attempt(attempt),
    )
}
