//! # Duress Testing
//!
//! Test doubles for Duress benchmarks: a mock client for the system under
//! test, and scripted conditions and operations with deterministic timing.
//!
//! ## Usage
//!
//! ```rust
//! use duress_core::{ClockMeasurement, Driver, DriverConfig, Scenario};
//! use duress_testing::{FakeClock, ScriptedCondition, ScriptedOperation};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let clock = FakeClock::new();
//! let condition = ScriptedCondition::new();
//! let driver = Driver::new(
//!     DriverConfig::default(),
//!     Arc::new(ClockMeasurement::new("fake", Arc::new(clock.clone()))),
//! );
//!
//! let report = driver
//!     .run(
//!         Scenario::new("scripted", condition.clone()),
//!         Arc::new(ScriptedOperation::new(clock, 0.5)),
//!     )
//!     .await;
//!
//! assert_eq!(report.samples, vec![0.5, 0.5, 0.5]);
//! assert_eq!(condition.teardown_count(), 1);
//! # });
//! ```

/// Mock client for the system under test
pub mod mock_client;
/// Scripted conditions and operations
pub mod scripted;

pub use duress_core::FakeClock;
pub use mock_client::MockClient;
pub use scripted::{Journal, ScriptedCondition, ScriptedOperation};
