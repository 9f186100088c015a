//! Bounded exponential backoff for container-engine transport errors.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`.
//! Only errors for which [`crate::NodekeeperError::is_retryable`] holds are retried;
//! permanent errors are returned on the first failure.
//!
//! ```rust
//! use std::time::Duration;
//! use nodekeeper::retry::BackoffPolicy;
//!
//! let policy = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     max_attempts: 5,
//! };
//! assert_eq!(policy.delay(0), Duration::from_millis(100));
//! assert_eq!(policy.delay(1), Duration::from_millis(200));
//! assert_eq!(policy.delay(10), Duration::from_secs(1));
//! ```

use std::future::Future;
use std::time::Duration;

use crate::errors::NodekeeperResult;

#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Total attempts including the first one. `0` behaves like `1`.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(10),
            factor: 2.0,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to sleep after the given failed attempt (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` until it succeeds, fails permanently, or the retry budget is spent.
///
/// `what` names the operation in log lines.
pub async fn retry_transport<T, F, Fut>(
    policy: &BackoffPolicy,
    what: &str,
    mut op: F,
) -> NodekeeperResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = NodekeeperResult<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    operation = what,
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transport error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(operation = what, attempts, error = %e, "Retry budget exhausted");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NodekeeperError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(50),
            factor: 2.0,
            max_attempts,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = fast_policy(5);
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(1), Duration::from_millis(20));
        assert_eq!(policy.delay(2), Duration::from_millis(40));
        assert_eq!(policy.delay(3), Duration::from_millis(50));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(50));
    }

    #[test]
    fn test_constant_factor() {
        let policy = BackoffPolicy {
            factor: 1.0,
            ..fast_policy(3)
        };
        assert_eq!(policy.delay(0), policy.delay(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_transport(&fast_policy(5), "list", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(NodekeeperError::Transport("connection reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: NodekeeperResult<()> = retry_transport(&fast_policy(3), "logs", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(NodekeeperError::Transport("socket closed".into()))
            }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: NodekeeperResult<()> = retry_transport(&fast_policy(5), "pull", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(NodekeeperError::Driver("manifest unknown".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(NodekeeperError::Driver(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
