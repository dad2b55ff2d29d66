//! Capability for talking to the system under test
//!
//! The benchmark core never interprets what a request does; scenarios and
//! operations only need to know whether it succeeded.

use crate::error::ClientResult;
use async_trait::async_trait;

/// Opaque handle onto the system under test
///
/// Shared read-only as `Arc<dyn Client>` between the scenario generating load
/// and the operation being timed.
#[async_trait]
pub trait Client: Send + Sync {
    /// Issue one read request
    async fn read(&self) -> ClientResult<()>;

    /// Issue one write request carrying `payload`
    async fn write(&self, payload: &str) -> ClientResult<()>;
}
