//! Compare-and-swap retry for read-modify-write sequences.
//!
//! The store rejects a write whose revision token is stale. A
//! read-modify-write that reads the token at the start of its span and
//! passes it to the final write therefore either commits against exactly
//! the state it read, or fails with [`NoteError::Conflict`]. `ConflictRetry`
//! re-runs the whole span a bounded number of times with exponential
//! backoff. Any other error is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::{NoteError, Result};

/// Bounded exponential backoff on revision conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictRetry {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl ConflictRetry {
    /// Single attempt; conflicts go straight to the caller.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-conflict error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err @ NoteError::Conflict { .. }) if attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    log::warn!(
                        "[notes] {} hit a revision conflict (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn conflict() -> NoteError {
        NoteError::Conflict {
            path: "notes.json".into(),
            status: 409,
        }
    }

    fn fast(max_attempts: u32) -> ConflictRetry {
        ConflictRetry {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = ConflictRetry::default();
        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(400));
        assert_eq!(retry.backoff_for(10), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = Cell::new(0);
        let result = fast(3)
            .run("test", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(2)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(conflict()) }
            })
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(5)
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(NoteError::Network("connection reset".into())) }
            })
            .await;

        assert!(matches!(result, Err(NoteError::Network(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_none_surfaces_first_conflict() {
        let calls = Cell::new(0);
        let result: Result<()> = ConflictRetry::none()
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(conflict()) }
            })
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.get(), 1);
    }
}
