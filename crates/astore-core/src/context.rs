//! Per-call context: caller identity, cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AstoreError, AstoreResult};

/// Identity and lifetime of one engine call.
///
/// Every store and blob call made on behalf of the caller is raced against
/// the cancellation token and the deadline. Losing the race drops the
/// in-flight future, which rolls back any open transaction.
#[derive(Clone, Debug)]
pub struct CallContext {
    creator: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(creator: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Already-verified identity of the caller.
    pub fn creator(&self) -> &str {
        &self.creator
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the call is already cancelled or past its deadline.
    pub fn check(&self) -> AstoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AstoreError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AstoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the call is cancelled or times out first.
    pub async fn run<T, E, F>(&self, fut: F) -> AstoreResult<T>
    where
        F: Future<Output = Result<T, E>>,
        AstoreError: From<E>,
    {
        self.check()?;
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AstoreError::Cancelled),
            _ = expired => Err(AstoreError::DeadlineExceeded),
            res = fut => res.map_err(AstoreError::from),
        }
    }
}
