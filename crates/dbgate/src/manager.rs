//! The resource manager.
//!
//! [`ResourceManager`] owns the one shared client and hands out [`Lease`]s
//! for it under the admission gate. [`ManagerCell`] provides the lazily
//! constructed, single-instance lifecycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OnceCell};

use crate::client::{ClientFactory, ResourceClient};
use crate::config::{ClientOptions, PoolConfig};
use crate::error::PoolError;
use crate::gate::{AdmissionGate, GatePermit};
use crate::registry::{LeaseId, LeaseInfo, LeaseRegistry};

/// Single point of access to a shared resource client.
///
/// At most [`PoolConfig::max_connections`] leases are outstanding at any time;
/// further [`acquire`](ResourceManager::acquire) calls wait for a release.
pub struct ResourceManager<C> {
    client: Arc<C>,
    config: PoolConfig,
    gate: AdmissionGate,
    registry: Arc<LeaseRegistry>,
    next_id: AtomicU64,
    // Set once the client's own disconnect has succeeded.
    disconnected: Mutex<bool>,
}

impl<C: ResourceClient> ResourceManager<C> {
    /// Wrap an already connected client.
    pub fn new(client: C, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self::assemble(client, config))
    }

    fn assemble(client: C, config: PoolConfig) -> Self {
        tracing::info!(
            max_connections = config.max_connections,
            operation_timeout = ?config.operation_timeout,
            "resource manager created"
        );

        Self {
            client: Arc::new(client),
            gate: AdmissionGate::new(config.max_connections),
            registry: Arc::new(LeaseRegistry::new()),
            next_id: AtomicU64::new(1),
            disconnected: Mutex::new(false),
            config,
        }
    }

    /// Build the client through `factory`, then wrap it.
    ///
    /// Construction failures are returned as
    /// [`PoolError::ConnectionCreation`]; nothing is retried.
    pub async fn connect<F>(
        factory: &F,
        options: &ClientOptions,
        config: PoolConfig,
    ) -> Result<Self, PoolError>
    where
        F: ClientFactory<Client = C>,
    {
        config.validate()?;

        let client = factory.create(options).await.map_err(|e| {
            tracing::error!(error = %e, "failed to create resource client");
            PoolError::ConnectionCreation(e.to_string())
        })?;

        Ok(Self::assemble(client, config))
    }

    /// Wait for admission and take a lease on the client.
    pub async fn acquire(&self) -> Result<Lease<C>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let permit = self.gate.acquire().await?;
        Ok(self.grant(permit))
    }

    /// Take a lease only if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<Lease<C>>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        Ok(self.gate.try_acquire()?.map(|permit| self.grant(permit)))
    }

    fn grant(&self, permit: GatePermit) -> Lease<C> {
        let id = LeaseId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry.register(id);
        tracing::trace!(lease = %id, "lease acquired");

        Lease {
            id,
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            permit: Some(permit),
        }
    }

    /// Number of leases currently held.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.count()
    }

    /// Metadata for every lease currently held.
    #[must_use]
    pub fn active_leases(&self) -> Vec<LeaseInfo> {
        self.registry.snapshot()
    }

    /// Get the current status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let in_use = self.registry.count() as u32;
        PoolStatus {
            available: self.gate.available() as u32,
            in_use,
            max: self.gate.max(),
            closed: self.is_closed(),
        }
    }

    /// The shared client, without taking a lease.
    ///
    /// Work done through this reference is not counted against the cap.
    #[must_use]
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check if the manager has stopped issuing leases.
    /// Whether the manager has stopped issuing leases.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Stop issuing leases and close the client.
    ///
    /// Waiters blocked in [`acquire`](Self::acquire) fail with
    /// [`PoolError::PoolClosed`]. Leases already handed out keep their client
    /// reference, but the connection behind it is gone.
    ///
    /// Once the client has disconnected, further calls do nothing. If the
    /// client's disconnect fails, the gate stays closed and the next call
    /// tries the client again.
    pub async fn disconnect(&self) -> Result<(), PoolError> {
        let mut disconnected = self.disconnected.lock().await;
        if *disconnected {
            tracing::debug!("resource manager already disconnected");
            return Ok(());
        }

        self.gate.close();
        let outstanding = self.registry.count();
        if outstanding > 0 {
            tracing::warn!(outstanding, "disconnecting with leases still held");
        }

        self.client.disconnect().await.map_err(|e| {
            tracing::error!(error = %e, "resource client failed to disconnect");
            PoolError::Disconnect(e.to_string())
        })?;

        *disconnected = true;
        tracing::info!("resource manager disconnected");
        Ok(())
    }
}

impl<C: ResourceClient> fmt::Debug for ResourceManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("active", &self.registry.count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Status information about the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Leases that could be granted right now.
    pub available: u32,
    /// Leases currently held.
    pub in_use: u32,
    /// Maximum concurrent leases.
    pub max: u32,
    /// Whether the manager has stopped issuing leases.
    pub closed: bool,
}

/// A granted lease on the shared client.
///
/// This is both the handle and the release capability: the lease is released
/// when [`release`](Lease::release) is called or the value is dropped, so it
/// is released exactly once on every path, unwinding included.
#[must_use = "dropping a lease immediately releases it"]
pub struct Lease<C> {
    id: LeaseId,
    client: Arc<C>,
    registry: Arc<LeaseRegistry>,
    permit: Option<GatePermit>,
}

impl<C> Lease<C> {
    /// Identifier of this lease.
    #[must_use]
    pub fn id(&self) -> LeaseId {
        self.id
    }

    /// The shared client.
    #[must_use]
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Give the lease back.
    pub fn release(self) {
        drop(self);
    }
}

impl<C> std::ops::Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<C> Drop for Lease<C> {
    fn drop(&mut self) {
        // Unregister before the permit goes back, so a new holder can never
        // be admitted while this lease still shows as active.
        let info = self.registry.unregister(self.id);
        if let Some(permit) = self.permit.take() {
            permit.release();
        }

        match info {
            Some(info) => tracing::trace!(lease = %self.id, held = ?info.held_for(), "lease released"),
            None => tracing::trace!(lease = %self.id, "lease released"),
        }
    }
}

/// Lazily constructed, process-wide manager.
///
/// Share one `ManagerCell` (for example behind an `Arc` or in a `static`)
/// among all consumers. The first [`get_instance`](ManagerCell::get_instance)
/// builds the client; concurrent first calls wait for that single
/// construction and every caller receives the same instance.
pub struct ManagerCell<F: ClientFactory> {
    factory: F,
    options: ClientOptions,
    config: PoolConfig,
    instance: OnceCell<Arc<ResourceManager<F::Client>>>,
}

impl<F: ClientFactory> ManagerCell<F> {
    /// Create an empty cell.
    pub fn new(factory: F, options: ClientOptions, config: PoolConfig) -> Self {
        Self {
            factory,
            options,
            config,
            instance: OnceCell::new(),
        }
    }

    /// Return the manager, constructing it on first use.
    ///
    /// If construction fails the error is returned and the cell stays empty.
    pub async fn get_instance(&self) -> Result<Arc<ResourceManager<F::Client>>, PoolError> {
        self.instance
            .get_or_try_init(|| async {
                tracing::debug!("constructing shared resource manager");
                let manager =
                    ResourceManager::connect(&self.factory, &self.options, self.config.clone())
                        .await?;
                Ok::<_, PoolError>(Arc::new(manager))
            })
            .await
            .map(Arc::clone)
    }

    /// Return the manager if it has been constructed.
    #[must_use]
    pub fn get(&self) -> Option<Arc<ResourceManager<F::Client>>> {
        self.instance.get().map(Arc::clone)
    }

    /// Check whether the manager has been constructed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instance.initialized()
    }
}

impl<F: ClientFactory> fmt::Debug for ManagerCell<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCell")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
