//! Guarded operation tests against the mock client.
//!
//! ```bash
//! cargo test -p dbgate-testing --test guarded_operations
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use dbgate::{ClientOptions, PoolConfig, ResourceManager, RunError};
use dbgate_testing::{MockClient, MockError, MockFactory};
use tokio::time::{self, Instant};

async fn manager(factory: &MockFactory, config: PoolConfig) -> Arc<ResourceManager<MockClient>> {
    Arc::new(
        ResourceManager::connect(factory, &ClientOptions::new(), config)
            .await
            .expect("mock factory should connect"),
    )
}

#[tokio::test(start_paused = true)]
async fn test_quick_operation_returns_its_result() {
    let factory = MockFactory::builder()
        .with_latency(Duration::from_secs(1))
        .build();
    let manager = manager(&factory, PoolConfig::new()).await;
    let observer = Arc::clone(&manager);

    let (affected, during) = manager
        .run(move |client| async move {
            let affected = client.execute("UPDATE users SET active = 1").await?;
            Ok::<_, MockError>((affected, observer.active_count()))
        })
        .await
        .unwrap();

    assert_eq!(affected, 1);
    assert_eq!(during, 1);
    assert!(manager.active_count() < during);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_operation_times_out_and_releases() {
    let factory = MockFactory::builder()
        .with_latency(Duration::from_secs(120))
        .build();
    let manager = manager(&factory, PoolConfig::new().max_connections(1)).await;
    let start = Instant::now();

    let err = manager
        .run_detached(|client| async move { client.execute("SELECT pg_sleep(120)").await })
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "Database operation timeout");
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() < Duration::from_secs(31));

    // The statement is still running on the client, but the slot is free.
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.client().in_flight(), 1);
    assert!(manager.try_acquire().unwrap().is_some());

    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(manager.client().in_flight(), 0);
    assert_eq!(manager.client().executed(), vec!["SELECT pg_sleep(120)"]);
}

#[tokio::test]
async fn test_operation_error_passes_through_unchanged() {
    let factory = MockFactory::builder()
        .with_failing_statement("INSERT INTO users VALUES (1)")
        .build();
    let manager = manager(&factory, PoolConfig::new()).await;

    let err = manager
        .run(|client| async move { client.execute("INSERT INTO users VALUES (1)").await })
        .await
        .unwrap_err();

    assert_eq!(
        err.into_operation(),
        Some(MockError::Statement("INSERT INTO users VALUES (1)".into()))
    );
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_client_never_sees_more_than_max_concurrent_statements() {
    let factory = MockFactory::builder()
        .with_latency(Duration::from_millis(200))
        .build();
    let manager = manager(&factory, PoolConfig::new().max_connections(4)).await;

    let mut handles = Vec::new();
    for i in 0..25 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .run(move |client| async move {
                    client.execute(&format!("SELECT {i}")).await
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(manager.client().peak_in_flight(), 4);
    assert_eq!(manager.client().executed().len(), 25);
    assert_eq!(manager.active_count(), 0);
}

#[tokio::test]
async fn test_run_after_disconnect_is_rejected() {
    let factory = MockFactory::default();
    let manager = manager(&factory, PoolConfig::new()).await;
    manager.disconnect().await.unwrap();

    let result = manager
        .run(|client| async move { client.execute("SELECT 1").await })
        .await;

    assert!(matches!(result, Err(RunError::Pool(_))));
}
