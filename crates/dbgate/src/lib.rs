//! # dbgate
//!
//! Bounded-concurrency access to one shared database client.
//!
//! Many tasks share a single, expensive client. This crate caps how many of
//! them may use it at once, tracks which leases are active, and puts a hard
//! deadline on every guarded operation so a stalled call cannot hold its
//! slot forever.
//!
//! ## Features
//!
//! - Admission gate (counting semaphore) sized by `max_connections`
//! - Lease registry for observing active holders
//! - RAII leases: released exactly once, including on panic
//! - Guarded operations raced against a per-operation deadline
//! - Race-free lazy construction of the shared manager via [`ManagerCell`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbgate::{ClientOptions, ManagerCell, PoolConfig};
//!
//! let cell = ManagerCell::new(
//!     MyClientFactory,
//!     ClientOptions::from_env()?,
//!     PoolConfig::new().max_connections(10),
//! );
//!
//! let manager = cell.get_instance().await?;
//! let users = manager
//!     .run(|client| async move { client.list_users().await })
//!     .await?;
//!
//! manager.disconnect().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod manager;
pub mod registry;
mod runner;

pub use client::{ClientError, ClientFactory, ResourceClient};
pub use config::{ClientOptions, LogLevel, PoolConfig};
pub use error::{PoolError, RunError};
pub use gate::{AdmissionGate, GatePermit};
pub use manager::{Lease, ManagerCell, PoolStatus, ResourceManager};
pub use registry::{LeaseId, LeaseInfo, LeaseRegistry};
