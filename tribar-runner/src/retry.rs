//! Fixed-backoff retry around a whole scan cycle.
//!
//! Side effects of a failed attempt (alerts sent, orders placed) are not
//! rolled back; the next attempt starts from scratch and the guard's admission
//! check is what keeps a repeated entry off the book.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted; returns the last error.
///
/// `op` receives the 1-based attempt number.
pub fn with_retry<T, E, F>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    %label,
                    attempt,
                    attempts,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                std::thread::sleep(policy.backoff);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(%label, attempts, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}
