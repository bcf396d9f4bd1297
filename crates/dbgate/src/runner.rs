//! Guarded operations: bounded concurrency plus a hard deadline.
//!
//! An operation runs under a lease and races a timer. Whichever settles first
//! decides the outcome, and the lease is released before the outcome is
//! returned. If the timer wins, the operation is not guaranteed to stop:
//! [`run`](ResourceManager::run) drops its future, which only takes effect at
//! the next suspension point, and [`run_detached`](ResourceManager::run_detached)
//! leaves it running in the background as its own task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::client::ResourceClient;
use crate::error::{PoolError, RunError};
use crate::manager::ResourceManager;
use crate::registry::LeaseId;

impl<C: ResourceClient> ResourceManager<C> {
    /// Run `operation` against the shared client under a lease, bounded by
    /// the configured [`operation_timeout`](crate::PoolConfig::operation_timeout).
    ///
    /// The operation's own error is returned unchanged inside
    /// [`RunError::Operation`]. The lease is released on every path, including
    /// a panic inside the operation. If the deadline wins, the operation's
    /// future is dropped.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let total = manager
    ///     .run(|client| async move { client.count_users().await })
    ///     .await?;
    /// ```
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_timeout(self.config().operation_timeout, operation)
            .await
    }

    /// Like [`run`](Self::run), with an explicit deadline for this call.
    pub async fn run_with_timeout<F, Fut, T, E>(
        &self,
        deadline: Duration,
        operation: F,
    ) -> Result<T, RunError<E>>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let lease = self.acquire().await?;
        let lease_id = lease.id();
        let client = Arc::clone(lease.client());

        let outcome = time::timeout(deadline, operation(client)).await.ok();
        lease.release();

        settle(lease_id, deadline, "cancel", outcome)
    }

    /// Like [`run`](Self::run), but the operation runs as its own task and
    /// keeps running in the background if the deadline wins.
    ///
    /// A panic inside the operation is resumed on the caller once the lease
    /// has been released.
    pub async fn run_detached<F, Fut, T, E>(&self, operation: F) -> Result<T, RunError<E>>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.run_detached_with_timeout(self.config().operation_timeout, operation)
            .await
    }

    /// Like [`run_detached`](Self::run_detached), with an explicit deadline
    /// for this call.
    pub async fn run_detached_with_timeout<F, Fut, T, E>(
        &self,
        deadline: Duration,
        operation: F,
    ) -> Result<T, RunError<E>>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let lease = self.acquire().await?;
        let lease_id = lease.id();

        let mut task = tokio::spawn(operation(Arc::clone(lease.client())));
        let outcome = match time::timeout(deadline, &mut task).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(join_err)) => {
                lease.release();
                match join_err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // The runtime cancelled the task; it is shutting down.
                    Err(_) => return Err(RunError::Pool(PoolError::PoolClosed)),
                }
            }
            // Dropping the handle leaves the task running.
            Err(_) => None,
        };
        lease.release();

        settle(lease_id, deadline, "detach", outcome)
    }
}

fn settle<T, E>(
    lease_id: LeaseId,
    deadline: Duration,
    mode: &'static str,
    outcome: Option<Result<T, E>>,
) -> Result<T, RunError<E>> {
    match outcome {
        Some(Ok(value)) => {
            tracing::debug!(lease = %lease_id, "guarded operation completed");
            Ok(value)
        }
        Some(Err(err)) => {
            tracing::debug!(lease = %lease_id, "guarded operation failed");
            Err(RunError::Operation(err))
        }
        None => {
            tracing::warn!(
                lease = %lease_id,
                timeout = ?deadline,
                mode,
                "guarded operation timed out"
            );
            Err(RunError::Timeout(deadline))
        }
    }
}
