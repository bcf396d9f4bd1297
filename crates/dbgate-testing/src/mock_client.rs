//! Mock resource client and factory.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbgate::{ClientError, ClientFactory, ClientOptions, ResourceClient};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors produced by the mock client and factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    /// A statement configured to fail was executed.
    #[error("statement failed: {0}")]
    Statement(String),

    /// The client was used after disconnect.
    #[error("client is disconnected")]
    Disconnected,

    /// The factory was configured to refuse this connection attempt.
    #[error("connection refused: {0}")]
    ConnectRefused(String),
}

/// In-memory stand-in for a database client.
///
/// Safe to share across tasks. Tracks how many statements are executing at
/// once so tests can check the admission cap from the client's side.
#[derive(Debug)]
pub struct MockClient {
    id: u64,
    options: ClientOptions,
    latency: Duration,
    failing: Arc<HashSet<String>>,
    connected: AtomicBool,
    disconnect_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MockClient {
    /// Create a standalone connected client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(0, ClientOptions::new(), Duration::ZERO, Arc::default())
    }

    fn with_settings(
        id: u64,
        options: ClientOptions,
        latency: Duration,
        failing: Arc<HashSet<String>>,
    ) -> Self {
        Self {
            id,
            options,
            latency,
            failing,
            connected: AtomicBool::new(true),
            disconnect_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Construction sequence number assigned by the factory.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Options the client was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Execute a statement, returning the number of affected rows.
    ///
    /// Waits for the configured latency first. Statements registered with
    /// [`MockFactoryBuilder::with_failing_statement`] fail after that wait.
    pub async fn execute(&self, sql: &str) -> Result<u64, MockError> {
        if !self.is_connected() {
            return Err(MockError::Disconnected);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tracing::trace!(client = self.id, sql, "executing statement");

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.executed.lock().push(sql.to_owned());

        if self.failing.contains(sql) {
            return Err(MockError::Statement(sql.to_owned()));
        }
        Ok(1)
    }

    /// Statements that ran to completion, in completion order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Statements currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of statements ever executing at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// How many times `disconnect` has been called.
    #[must_use]
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    async fn disconnect(&self) -> Result<(), ClientError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        tracing::debug!(client = self.id, "mock client disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct FactoryState {
    created: AtomicU64,
    attempts: AtomicUsize,
    refusals_left: AtomicUsize,
    connect_delay: Duration,
    latency: Duration,
    failing: Arc<HashSet<String>>,
}

/// Builds [`MockClient`]s and counts how often it was asked to.
///
/// Clones share their counters, so a test can keep one clone after handing
/// another to a manager.
#[derive(Debug, Clone)]
pub struct MockFactory {
    state: Arc<FactoryState>,
}

impl MockFactory {
    /// Create a builder for a mock factory.
    #[must_use]
    pub fn builder() -> MockFactoryBuilder {
        MockFactoryBuilder::new()
    }

    /// Number of clients successfully built.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Number of `create` calls, failed ones included.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.state.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        MockFactoryBuilder::new().build()
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    type Client = MockClient;

    async fn create(&self, options: &ClientOptions) -> Result<MockClient, ClientError> {
        let state = &self.state;
        let attempt = state.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if !state.connect_delay.is_zero() {
            tokio::time::sleep(state.connect_delay).await;
        }

        let refused = state
            .refusals_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            tracing::debug!(attempt, "mock factory refusing connection");
            return Err(MockError::ConnectRefused(format!("attempt {attempt} refused")).into());
        }

        let id = state.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockClient::with_settings(
            id,
            options.clone(),
            state.latency,
            Arc::clone(&state.failing),
        ))
    }
}

/// Builder for [`MockFactory`].
#[derive(Debug, Default)]
pub struct MockFactoryBuilder {
    connect_delay: Duration,
    latency: Duration,
    refusals: usize,
    failing: HashSet<String>,
}

impl MockFactoryBuilder {
    /// Create a builder with no delays and no failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `create` call.
    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Delay every executed statement.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Refuse the first `count` connection attempts.
    #[must_use]
    pub fn with_refusals(mut self, count: usize) -> Self {
        self.refusals = count;
        self
    }

    /// Make a statement fail when executed.
    #[must_use]
    pub fn with_failing_statement(mut self, sql: impl Into<String>) -> Self {
        self.failing.insert(sql.into());
        self
    }

    /// Build the factory.
    #[must_use]
    pub fn build(self) -> MockFactory {
        MockFactory {
            state: Arc::new(FactoryState {
                created: AtomicU64::new(0),
                attempts: AtomicUsize::new(0),
                refusals_left: AtomicUsize::new(self.refusals),
                connect_delay: self.connect_delay,
                latency: self.latency,
                failing: Arc::new(self.failing),
            }),
        }
    }
}
