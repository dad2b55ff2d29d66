//! # Duress Core
//!
//! Scenario lifecycle, measurement and benchmark driver for Duress.
//!
//! A benchmark run measures how long an operation takes while the system
//! under test is held in a controlled condition (idle, under synthetic
//! request load, ...). The condition must be established before the first
//! trial and may collapse at any time; a collapse ends the run.
//!
//! ## Building blocks
//!
//! - **EventChannel**: one-shot, re-armable fan-out signal
//! - **Scenario**: `Starting → Established → Maintaining → Stopping → Stopped`
//!   state machine around a pluggable [`Condition`]
//! - **Measurement**: times one operation against a [`Clock`]
//! - **Driver**: establishes the scenario, races each trial against collapse
//!   and always tears the scenario down
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use duress_core::{
//!     ClockMeasurement, Condition, Driver, DriverConfig, HealthMonitor, Operation,
//!     OperationResult, Scenario, ScenarioResult,
//! };
//! use std::sync::Arc;
//!
//! struct Idle;
//!
//! #[async_trait]
//! impl Condition for Idle {
//!     async fn establish(&self, _health: HealthMonitor) -> ScenarioResult<()> {
//!         Ok(())
//!     }
//!
//!     async fn teardown(&self) -> ScenarioResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! struct Noop;
//!
//! #[async_trait]
//! impl Operation for Noop {
//!     fn name(&self) -> &str {
//!         "noop"
//!     }
//!
//!     async fn run(&self) -> OperationResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let driver = Driver::new(DriverConfig::default(), Arc::new(ClockMeasurement::wallclock()));
//! let report = driver.run(Scenario::new("idle", Idle), Arc::new(Noop)).await;
//! assert_eq!(report.samples.len(), 3);
//! # });
//! ```

pub mod channel;
pub mod client;
pub mod clock;
pub mod driver;
pub mod error;
pub mod measurement;
pub mod operation;
pub mod scenario;
pub mod signal;

pub use channel::{EventChannel, Subscription};
pub use client::Client;
pub use clock::{Clock, FakeClock, MonotonicClock};
pub use driver::{Driver, DriverConfig, RunReport};
pub use error::{
    ClientError, ClientResult, CollapseReason, DriverError, OperationError, OperationResult,
    ScenarioError, ScenarioResult, SetupFailure,
};
pub use measurement::{ClockMeasurement, Measurement};
pub use operation::Operation;
pub use scenario::{Condition, HealthMonitor, Scenario, ScenarioState, StartHandle};
pub use signal::{Collapse, Establishment};

#[cfg(unix)]
pub use clock::ProcessCpuClock;
