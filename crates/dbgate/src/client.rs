//! The seam to the external resource client.
//!
//! The manager never issues queries itself. It only needs to build the client
//! once, hand out shared references to it, and shut it down at the end. These
//! traits describe exactly that much of the collaborator.

use crate::config::ClientOptions;

/// Error type returned across the client seam.
pub type ClientError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A connected resource client shared by every lease holder.
///
/// Implementations must tolerate concurrent use by up to
/// [`PoolConfig::max_connections`](crate::PoolConfig::max_connections) callers.
/// `#[async_trait]` keeps the trait object-safe.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync + 'static {
    /// Close the underlying connection.
    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Check whether the client still considers itself connected.
    fn is_connected(&self) -> bool;
}

/// Builds the shared resource client.
#[async_trait::async_trait]
pub trait ClientFactory: Send + Sync {
    /// The client this factory produces.
    type Client: ResourceClient;

    /// Build and connect a client from the given options.
    async fn create(&self, options: &ClientOptions) -> Result<Self::Client, ClientError>;
}
