//! # Duress
//!
//! Time operations against a system under test while it is held in a
//! controlled condition, such as synthetic request load.
//!
//! This crate re-exports the workspace:
//!
//! - [`duress_core`]: event channel, scenario lifecycle, measurement, driver
//! - [`load`]: concrete scenarios, operations, HTTP client and configuration
//! - `testing` (feature `testing`): test doubles
//!
//! ## Example
//!
//! ```rust
//! use duress::load::{DuressConfig, NoLoad, NoOp};
//! use duress::{ClockMeasurement, Driver, DriverConfig};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let driver = Driver::new(
//!     DriverConfig { samples: 5, setup_timeout: None },
//!     Arc::new(ClockMeasurement::wallclock()),
//! );
//! let report = driver.run(NoLoad::scenario("idle"), Arc::new(NoOp::default())).await;
//!
//! assert!(report.is_success());
//! assert_eq!(report.samples.len(), 5);
//! # });
//! ```

pub use duress_core::{
    Client, ClientError, ClientResult, Clock, ClockMeasurement, Collapse, CollapseReason,
    Condition, Driver, DriverConfig, DriverError, Establishment, EventChannel, FakeClock,
    HealthMonitor, Measurement, MonotonicClock, Operation, OperationError, OperationResult,
    RunReport, Scenario, ScenarioError, ScenarioResult, ScenarioState, SetupFailure, StartHandle,
    Subscription,
};

#[cfg(unix)]
pub use duress_core::ProcessCpuClock;

/// Concrete scenarios, operations and configuration
pub use duress_load as load;

/// Test doubles
#[cfg(feature = "testing")]
pub use duress_testing as testing;
