//! Operations timed by a benchmark run

use crate::error::OperationResult;
use async_trait::async_trait;

/// A unit of work executed once per trial
#[async_trait]
pub trait Operation: Send + Sync {
    /// Name used in reports and logs
    fn name(&self) -> &str;

    /// Execute the work once
    async fn run(&self) -> OperationResult<()>;
}
