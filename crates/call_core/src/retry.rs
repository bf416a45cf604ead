use std::{future::Future, time::Duration};

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: usize },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: usize, last_error: E },
    /// An attempt failed with an error that must not be retried.
    Aborted { attempts: usize, error: E },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> usize {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Runs `operation` up to `policy.max_attempts` times, sleeping `policy.delay`
/// between attempts. No sleep follows the final attempt.
pub async fn retry_with_fixed_delay<T, E, Op, Fut, Retryable>(
    label: &str,
    policy: RetryPolicy,
    mut operation: Op,
    is_retryable: Retryable,
) -> RetryOutcome<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Retryable: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) if !is_retryable(&error) => {
                return RetryOutcome::Aborted {
                    attempts: attempt,
                    error,
                }
            }
            Err(error) if attempt >= max_attempts => {
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                }
            }
            Err(error) => {
                info!(
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    %error,
                    "retrying after transient failure"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/retry_tests.rs"]
mod tests;
