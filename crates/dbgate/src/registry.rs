//! Active lease bookkeeping.
//!
//! The registry has no say in admission; it only records which leases are
//! currently held so that callers can observe them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Identifier of one lease.
///
/// Ids come from a per-manager monotonic counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseId(u64);

impl LeaseId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lease-{}", self.0)
    }
}

/// Metadata about an active lease.
#[derive(Debug, Clone)]
pub struct LeaseInfo {
    /// Identifier of the lease.
    pub id: LeaseId,
    /// When the lease was granted.
    pub acquired_at: Instant,
}

impl LeaseInfo {
    /// Create metadata for a lease granted now.
    #[must_use]
    pub fn new(id: LeaseId) -> Self {
        Self {
            id,
            acquired_at: Instant::now(),
        }
    }

    /// How long the lease has been held.
    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// The set of currently active leases.
#[derive(Debug, Default)]
pub struct LeaseRegistry {
    active: Mutex<BTreeMap<LeaseId, LeaseInfo>>,
}

impl LeaseRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lease as active.
    ///
    /// Registering an id twice keeps the original entry.
    pub fn register(&self, id: LeaseId) {
        let mut active = self.active.lock();
        if active.contains_key(&id) {
            tracing::warn!(lease = %id, "lease registered twice; keeping original entry");
            return;
        }
        active.insert(id, LeaseInfo::new(id));
    }

    /// Forget a lease. Unknown ids are ignored.
    pub fn unregister(&self, id: LeaseId) -> Option<LeaseInfo> {
        self.active.lock().remove(&id)
    }

    /// Number of active leases.
    #[must_use]
    pub fn count(&self) -> usize {
        self.active.lock().len()
    }

    /// Check whether a lease is active.
    #[must_use]
    pub fn contains(&self, id: LeaseId) -> bool {
        self.active.lock().contains_key(&id)
    }

    /// Copy of the active entries, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LeaseInfo> {
        self.active.lock().values().cloned().collect()
    }
}
