//! # Duress Load
//!
//! Concrete scenarios, operations and configuration for Duress benchmarks.
//!
//! ## Features
//!
//! - **Scenarios**: `no-load` and rate-controlled `read-request-load` /
//!   `write-request-load`
//! - **Operations**: `no-op`, `read-request`, `write-request`
//! - **Configuration**: YAML files resolved by name into ready-to-run
//!   scenarios, operations and measurements
//! - **HTTP client** (feature `http`, on by default): `reqwest` based
//!   [`duress_core::Client`]
//!
//! ## Example
//!
//! ```rust
//! use duress_load::DuressConfig;
//!
//! let config = DuressConfig::from_yaml(
//!     "scenarios:\n  - name: read-50\n    type: read-request-load\n    request_rate: 50\n",
//! )?;
//! assert_eq!(config.scenario_names(), vec!["read-50"]);
//! assert_eq!(config.operation_names(), vec!["default"]);
//! # Ok::<(), duress_load::ConfigError>(())
//! ```

pub mod config;
pub mod error;
pub mod operations;
pub mod rate;
pub mod scenarios;

#[cfg(feature = "http")]
pub mod http;

pub use config::{
    DEFAULT_NAME, DuressConfig, MetricEntry, MetricKind, OperationEntry, OperationKind,
    ScenarioEntry, ScenarioKind, TargetConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use operations::{NoOp, ReadRequest, WriteRequest};
pub use rate::{LoadCounters, RateMeasurer};
pub use scenarios::{NoLoad, RequestKind, RequestLoad, RequestLoadConfig};

#[cfg(feature = "http")]
pub use http::HttpClient;
