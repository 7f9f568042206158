//! Retry policy for read-modify-write transactions.

use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

use crate::context::CallContext;
use crate::error::{AstoreError, AstoreResult};
use crate::options::RetryConfig;

impl RetryConfig {
    /// Delays between attempts: `initial_backoff` doubling up to `max_backoff`, jittered.
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        let millis = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let factor = (millis / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_backoff)
            .map(jitter)
            .take(self.attempts.saturating_sub(1))
    }
}

/// Run `unit` until it succeeds, fails with a non-retryable error, or the
/// attempts run out.
///
/// Each attempt must open, read and commit its own transaction so that the
/// whole unit is re-executed from scratch after a conflict. The backoff
/// sleeps count against the call's deadline.
pub(crate) async fn with_retry<T, F, Fut>(
    ctx: &CallContext,
    config: &RetryConfig,
    description: &'static str,
    unit: F,
) -> AstoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AstoreResult<T>>,
{
    let mut attempt = 0usize;
    let retry = RetryIf::spawn(config.strategy(), unit, |err: &AstoreError| {
        attempt += 1;
        let retryable = err.is_retryable();
        if retryable {
            warn!(description, attempt, error = %err, "transaction contended");
        }
        retryable
    });
    ctx.run(retry).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use astore_store::{Key, Kind, StoreError};

    fn fast(attempts: usize) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn conflict() -> AstoreError {
        StoreError::Conflict(Key::named(Kind::PathElement, "root", None)).into()
    }

    #[test]
    fn strategy_length_matches_attempts() {
        assert_eq!(fast(10).strategy().count(), 9);
        assert_eq!(fast(0).strategy().count(), 0);
        assert!(RetryConfig::default()
            .strategy()
            .all(|d| d <= Duration::from_secs(2)));
    }

    #[test]
    fn huge_backoff_saturates() {
        let config = RetryConfig {
            attempts: 3,
            initial_backoff: Duration::MAX,
            max_backoff: Duration::from_secs(60),
        };
        let delays: Vec<Duration> = config.strategy().collect();
        assert_eq!(delays.len(), 2);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn retries_conflicts_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let ctx = CallContext::new("alice");
        let out = with_retry(&ctx, &fast(5), "test transaction", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(conflict())
            } else {
                Ok("done")
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_stop_immediately() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let ctx = CallContext::new("alice");
        let res: AstoreResult<()> = with_retry(&ctx, &fast(5), "test transaction", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AstoreError::NotFound("gone".into()))
        })
        .await;
        assert!(matches!(res, Err(AstoreError::NotFound(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_conflict() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let ctx = CallContext::new("alice");
        let res: AstoreResult<()> = with_retry(&ctx, &fast(3), "test transaction", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(conflict())
        })
        .await;
        assert!(res.unwrap_err().is_retryable());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
