//! Guarded operations example.
//!
//! Runs a burst of simulated queries against a shared client, with more
//! callers than the gate admits, and shows a deadline firing on a stalled
//! call.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=debug cargo run -p dbgate --example guarded_operations
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dbgate::{
    ClientError, ClientFactory, ClientOptions, ManagerCell, PoolConfig, ResourceClient, RunError,
};
use tokio::time::Instant;

/// Stand-in for a real database client.
struct SimulatedClient {
    url: String,
    connected: AtomicBool,
}

impl SimulatedClient {
    async fn query(&self, sql: &str, latency: Duration) -> Result<String, ClientError> {
        tokio::time::sleep(latency).await;
        Ok(format!("{} -> ok ({sql})", self.url))
    }
}

#[async_trait::async_trait]
impl ResourceClient for SimulatedClient {
    async fn disconnect(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

struct SimulatedFactory;

#[async_trait::async_trait]
impl ClientFactory for SimulatedFactory {
    type Client = SimulatedClient;

    async fn create(&self, options: &ClientOptions) -> Result<SimulatedClient, ClientError> {
        Ok(SimulatedClient {
            url: options
                .database_url
                .clone()
                .unwrap_or_else(|| "postgres://localhost/app".into()),
            connected: AtomicBool::new(true),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Guarded Operations Example ===\n");

    let cell = Arc::new(ManagerCell::new(
        SimulatedFactory,
        ClientOptions::from_env()?,
        PoolConfig::new()
            .max_connections(3)
            .operation_timeout(Duration::from_millis(500)),
    ));

    let manager = cell.get_instance().await?;
    println!("Max connections: {}", manager.config().max_connections);
    println!("Operation timeout: {:?}\n", manager.config().operation_timeout);

    // Example 1: more callers than permits
    println!("1. Ten concurrent queries through three permits:");
    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..10 {
        let cell = Arc::clone(&cell);
        handles.push(tokio::spawn(async move {
            let manager = cell.get_instance().await.map_err(|e| e.to_string())?;
            let sql = format!("SELECT {i}");
            manager
                .run(move |client| async move {
                    client.query(&sql, Duration::from_millis(100)).await
                })
                .await
                .map_err(|e| e.to_string())
        }));
    }
    for handle in handles {
        match handle.await? {
            Ok(row) => println!("  {row}"),
            Err(e) => println!("  failed: {e}"),
        }
    }
    println!("  Elapsed: {:?}", start.elapsed());
    print_status(&manager.status());

    // Example 2: a stalled query hits the deadline
    println!("\n2. Stalled query:");
    let result = manager
        .run(|client| async move {
            client
                .query("WAITFOR DELAY '00:01'", Duration::from_secs(60))
                .await
        })
        .await;
    match result {
        Err(RunError::Timeout(after)) => println!("  timed out after {after:?}"),
        other => println!("  unexpected: {other:?}"),
    }
    print_status(&manager.status());

    manager.disconnect().await?;
    println!("\nDisconnected: {}", !manager.client().is_connected());

    Ok(())
}

fn print_status(status: &dbgate::PoolStatus) {
    println!(
        "  Status: in_use={} available={} max={}",
        status.in_use, status.available, status.max
    );
}
