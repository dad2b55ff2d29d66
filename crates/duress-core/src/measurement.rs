//! Timing of individual operations

use crate::clock::{Clock, MonotonicClock};
use crate::error::OperationResult;
use crate::operation::Operation;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Strategy for turning one operation execution into a sample
#[async_trait]
pub trait Measurement: Send + Sync {
    /// Name used in reports and logs
    fn name(&self) -> &str;

    /// Run `operation` once and return the measured cost in seconds
    ///
    /// # Errors
    ///
    /// Returns the operation's own error unchanged; no sample is produced.
    async fn measure(&self, operation: &dyn Operation) -> OperationResult<f64>;
}

/// Time `work` against `clock`
///
/// The clock is read once before the work starts and once after it succeeds.
pub async fn time<F>(clock: &dyn Clock, work: F) -> OperationResult<f64>
where
    F: Future<Output = OperationResult<()>>,
{
    let start = clock.seconds();
    work.await?;
    Ok(clock.seconds() - start)
}

/// Measurement reading an arbitrary [`Clock`] around the operation
#[derive(Clone)]
pub struct ClockMeasurement {
    name: String,
    clock: Arc<dyn Clock>,
}

impl ClockMeasurement {
    pub fn new(name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            clock,
        }
    }

    /// Elapsed wall-clock seconds
    pub fn wallclock() -> Self {
        Self::new("wallclock", Arc::new(MonotonicClock::new()))
    }

    /// CPU seconds consumed by this process while the operation ran
    #[cfg(unix)]
    pub fn cputime() -> Self {
        Self::new("cputime", Arc::new(crate::clock::ProcessCpuClock::new()))
    }
}

#[async_trait]
impl Measurement for ClockMeasurement {
    fn name(&self) -> &str {
        &self.name
    }

    async fn measure(&self, operation: &dyn Operation) -> OperationResult<f64> {
        time(self.clock.as_ref(), operation.run()).await
    }
}

impl std::fmt::Debug for ClockMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockMeasurement")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
