// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with backoff.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Delay function applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Delay grows by `step` per failed attempt: `step`, `2 * step`, ...
    Linear(Duration),
    /// Delay doubles per failed attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after `failed_attempt` (1-based) before the next one.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(failed_attempt),
            Backoff::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(failed_attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Attempt count and delay function for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Linear backoff with `step` between attempts.
    pub fn linear(max_attempts: u32, step: Duration) -> Self {
        Self::new(max_attempts, Backoff::Linear(step))
    }

    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Sum of every delay a fully exhausted run would sleep.
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff.delay_after(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// A value produced within the retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// The retry budget ran out, or the error was not worth retrying.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds, `should_retry` rejects its error, or the
/// policy's attempts are used up. Sleeps `policy.backoff` between attempts.
///
/// `op_name` only labels the debug log lines.
pub async fn retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    op_name: &str,
    should_retry: R,
    mut op: F,
) -> Result<Retried<T>, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "succeeded after retry");
                }
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(err) => {
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    debug!(op = op_name, attempt, error = %err, "giving up");
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                let delay = policy.backoff.delay_after(attempt);
                debug!(op = op_name, attempt, ?delay, error = %err, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
