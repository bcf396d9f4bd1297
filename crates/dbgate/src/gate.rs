//! Admission control.
//!
//! A counting semaphore that bounds how many callers may hold the shared
//! client at once. Excess callers wait inside [`AdmissionGate::acquire`].

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::PoolError;

/// Bounds the number of concurrent holders.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max: u32,
}

impl AdmissionGate {
    /// Create a gate admitting at most `max` concurrent holders.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max as usize)),
            max,
        }
    }

    /// Wait for a permit.
    ///
    /// Fails only once the gate has been closed.
    pub async fn acquire(&self) -> Result<GatePermit, PoolError> {
        if self.semaphore.available_permits() == 0 {
            tracing::debug!(max = self.max, "admission gate at capacity; waiting");
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::PoolClosed)?;

        Ok(GatePermit { permit })
    }

    /// Take a permit without waiting.
    ///
    /// Returns `Ok(None)` when the gate is at capacity.
    pub fn try_acquire(&self) -> Result<Option<GatePermit>, PoolError> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(GatePermit { permit })),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(PoolError::PoolClosed),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Configured maximum.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Refuse all current waiters and future acquires.
    ///
    /// Permits already handed out stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Check whether the gate has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// Permission to use the shared client, returned by [`AdmissionGate::acquire`].
///
/// The permit goes back to the gate when this value is dropped or
/// [`released`](GatePermit::release), waking one waiter.
#[derive(Debug)]
#[must_use = "dropping a permit immediately returns it to the gate"]
pub struct GatePermit {
    permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Return the permit to the gate.
    pub fn release(self) {
        drop(self.permit);
    }
}
