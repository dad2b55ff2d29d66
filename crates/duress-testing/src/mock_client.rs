//! # Mock Client for Testing
//!
//! A [`Client`] that never touches the network. Calls are counted, writes are
//! recorded, and failure or latency can be switched on while a test runs.

use async_trait::async_trait;
use duress_core::{Client, ClientError, ClientResult};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// Scriptable in-process client
///
/// Clones share counters and switches, so a test can keep one clone and hand
/// another to the scenario under test.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    write_history: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
    latency_micros: Arc<AtomicU64>,
}

impl MockClient {
    /// Create a client that succeeds instantly
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Start out failing every call
    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    /// Switch failure on or off for subsequent calls
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Change the delay applied to subsequent calls
    pub fn set_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.store(micros, Ordering::SeqCst);
    }

    /// Number of `read` calls made
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write` calls made
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total number of calls made
    pub fn call_count(&self) -> usize {
        self.read_count() + self.write_count()
    }

    /// Payloads passed to `write`, in call order
    pub fn write_history(&self) -> Vec<String> {
        self.write_history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    /// Reset counters and history
    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        if let Ok(mut history) = self.write_history.lock() {
            history.clear();
        }
    }

    async fn respond(&self, kind: &str) -> ClientResult<()> {
        let micros = self.latency_micros.load(Ordering::SeqCst);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            trace!(kind, "Mock client failing call");
            return Err(ClientError::ConnectionFailed(
                "mock client is failing".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Client for MockClient {
    async fn read(&self) -> ClientResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.respond("read").await
    }

    async fn write(&self, payload: &str) -> ClientResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut history) = self.write_history.lock() {
            history.push(payload.to_string());
        }
        self.respond("write").await
    }
}
