//! Operations timed against the system under test

use crate::scenarios::DEFAULT_PAYLOAD;
use async_trait::async_trait;
use duress_core::{Client, Operation, OperationResult};
use std::sync::Arc;

/// Completes immediately; measures driver and clock overhead
#[derive(Debug, Clone)]
pub struct NoOp {
    name: String,
}

impl NoOp {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for NoOp {
    fn default() -> Self {
        Self::new("no-op")
    }
}

#[async_trait]
impl Operation for NoOp {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> OperationResult<()> {
        Ok(())
    }
}

/// One read request per run
pub struct ReadRequest {
    name: String,
    client: Arc<dyn Client>,
}

impl ReadRequest {
    pub fn new(name: impl Into<String>, client: Arc<dyn Client>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl Operation for ReadRequest {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> OperationResult<()> {
        self.client.read().await?;
        Ok(())
    }
}

/// One write request with a fixed payload per run
pub struct WriteRequest {
    name: String,
    client: Arc<dyn Client>,
    payload: String,
}

impl WriteRequest {
    pub fn new(name: impl Into<String>, client: Arc<dyn Client>) -> Self {
        Self {
            name: name.into(),
            client,
            payload: DEFAULT_PAYLOAD.to_string(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }
}

#[async_trait]
impl Operation for WriteRequest {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> OperationResult<()> {
        self.client.write(&self.payload).await?;
        Ok(())
    }
}
