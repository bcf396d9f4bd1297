//! # dbgate-testing
//!
//! Test infrastructure for `dbgate`.
//!
//! Provides an in-memory resource client whose connection state, executed
//! statements and peak concurrency can be inspected, and a factory that
//! counts how many clients it has built. No database is required.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbgate::{ClientOptions, ManagerCell, PoolConfig};
//! use dbgate_testing::MockFactory;
//!
//! #[tokio::test]
//! async fn test_with_mock_client() {
//!     let factory = MockFactory::builder()
//!         .with_latency(Duration::from_millis(5))
//!         .with_failing_statement("DROP TABLE users")
//!         .build();
//!
//!     let cell = ManagerCell::new(factory.clone(), ClientOptions::new(), PoolConfig::new());
//!     let manager = cell.get_instance().await.unwrap();
//!     // ...
//!     assert_eq!(factory.created_count(), 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_client;

pub use mock_client::{MockClient, MockError, MockFactory, MockFactoryBuilder};
