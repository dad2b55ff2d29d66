//! YAML configuration and the name → implementation registry
//!
//! Scenarios, operations and metrics are declared as named entries whose
//! `type` tag selects a variant of [`ScenarioKind`], [`OperationKind`] or
//! [`MetricKind`]. Each variant knows how to build its implementation, so
//! the set of available types is fixed at compile time.
//!
//! ```yaml
//! target:
//!   base_url: http://127.0.0.1:8080
//!   read_path: /items
//! scenarios:
//!   - name: default
//!     type: no-load
//!   - name: read-10
//!     type: read-request-load
//!     request_rate: 10
//! operations:
//!   - name: default
//!     type: read-request
//! metrics:
//!   - name: default
//!     type: wallclock
//! ```
//!
//! A section left out (or empty) gets a single `default` entry.

use crate::error::{ConfigError, ConfigResult};
use crate::operations::{NoOp, ReadRequest, WriteRequest};
use crate::scenarios::{DEFAULT_PAYLOAD, NoLoad, RequestKind, RequestLoad, RequestLoadConfig};
use duress_core::{Client, ClockMeasurement, Measurement, Operation, Scenario};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the entries in the built-in configuration
pub const DEFAULT_NAME: &str = "default";

/// Where and how to reach the system under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Path hit by read requests
    pub read_path: String,
    /// Path hit by write requests
    pub write_path: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            read_path: "/".to_string(),
            write_path: "/".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl TargetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Scenario types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ScenarioKind {
    NoLoad,
    ReadRequestLoad(RequestLoadConfig),
    WriteRequestLoad(RequestLoadConfig),
}

impl ScenarioKind {
    /// The `type` tag of this variant
    pub fn type_name(&self) -> &'static str {
        match self {
            ScenarioKind::NoLoad => "no-load",
            ScenarioKind::ReadRequestLoad(_) => "read-request-load",
            ScenarioKind::WriteRequestLoad(_) => "write-request-load",
        }
    }

    /// Build a fresh scenario; scenarios are single-use
    pub fn build(&self, name: &str, client: Arc<dyn Client>) -> Scenario {
        match self {
            ScenarioKind::NoLoad => NoLoad::scenario(name),
            ScenarioKind::ReadRequestLoad(config) => {
                RequestLoad::new(RequestKind::Read, config.clone(), client).into_scenario(name)
            }
            ScenarioKind::WriteRequestLoad(config) => {
                RequestLoad::new(RequestKind::Write, config.clone(), client).into_scenario(name)
            }
        }
    }

    fn request_load(&self) -> Option<&RequestLoadConfig> {
        match self {
            ScenarioKind::NoLoad => None,
            ScenarioKind::ReadRequestLoad(config) | ScenarioKind::WriteRequestLoad(config) => {
                Some(config)
            }
        }
    }
}

fn default_payload() -> String {
    DEFAULT_PAYLOAD.to_string()
}

/// Operation types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperationKind {
    NoOp,
    ReadRequest,
    WriteRequest {
        #[serde(default = "default_payload")]
        payload: String,
    },
}

impl OperationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            OperationKind::NoOp => "no-op",
            OperationKind::ReadRequest => "read-request",
            OperationKind::WriteRequest { .. } => "write-request",
        }
    }

    pub fn build(&self, name: &str, client: Arc<dyn Client>) -> Arc<dyn Operation> {
        match self {
            OperationKind::NoOp => Arc::new(NoOp::new(name)),
            OperationKind::ReadRequest => Arc::new(ReadRequest::new(name, client)),
            OperationKind::WriteRequest { payload } => {
                Arc::new(WriteRequest::new(name, client).with_payload(payload.clone()))
            }
        }
    }
}

/// Measurement types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MetricKind {
    Wallclock,
    Cputime,
}

impl MetricKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricKind::Wallclock => "wallclock",
            MetricKind::Cputime => "cputime",
        }
    }

    /// Build the measurement, named after its entry
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unsupported`] for `cputime` on platforms without
    /// `getrusage`.
    pub fn build(&self, name: &str) -> ConfigResult<Arc<dyn Measurement>> {
        match self {
            MetricKind::Wallclock => Ok(Arc::new(ClockMeasurement::new(
                name,
                Arc::new(duress_core::MonotonicClock::new()),
            ))),
            #[cfg(unix)]
            MetricKind::Cputime => Ok(Arc::new(ClockMeasurement::new(
                name,
                Arc::new(duress_core::ProcessCpuClock::new()),
            ))),
            #[cfg(not(unix))]
            MetricKind::Cputime => Err(ConfigError::Unsupported {
                section: "metric",
                name: name.to_string(),
                reason: "process CPU time is only available on Unix".to_string(),
            }),
        }
    }
}

/// Named scenario declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEntry {
    pub name: String,
    #[serde(flatten)]
    pub kind: ScenarioKind,
}

impl ScenarioEntry {
    pub fn build(&self, client: Arc<dyn Client>) -> Scenario {
        self.kind.build(&self.name, client)
    }
}

/// Named operation declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub name: String,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl OperationEntry {
    pub fn build(&self, client: Arc<dyn Client>) -> Arc<dyn Operation> {
        self.kind.build(&self.name, client)
    }
}

/// Named metric declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
}

impl MetricEntry {
    pub fn build(&self) -> ConfigResult<Arc<dyn Measurement>> {
        self.kind.build(&self.name)
    }
}

trait Named {
    fn name(&self) -> &str;
}

impl Named for ScenarioEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for OperationEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for MetricEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

fn names<T: Named>(entries: &[T]) -> Vec<String> {
    entries.iter().map(|entry| entry.name().to_string()).collect()
}

fn lookup<'a, T: Named>(section: &'static str, entries: &'a [T], name: &str) -> ConfigResult<&'a T> {
    entries
        .iter()
        .find(|entry| entry.name() == name)
        .ok_or_else(|| ConfigError::UnknownName {
            section,
            name: name.to_string(),
            available: names(entries),
        })
}

fn check_unique<T: Named>(section: &'static str, entries: &[T]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.name()) {
            return Err(ConfigError::DuplicateName {
                section,
                name: entry.name().to_string(),
            });
        }
    }
    Ok(())
}

fn check_request_load(name: &str, config: &RequestLoadConfig) -> ConfigResult<()> {
    let invalid = |field: &'static str, reason: &str| ConfigError::InvalidValue {
        section: "scenario",
        name: name.to_string(),
        field,
        reason: reason.to_string(),
    };

    if config.request_rate == 0 {
        return Err(invalid("request_rate", "must be greater than zero"));
    }
    if config.sample_size == 0 {
        return Err(invalid("sample_size", "must be greater than zero"));
    }
    if !(0.0..1.0).contains(&config.tolerance) {
        return Err(invalid("tolerance", "must be in [0, 1)"));
    }
    if config.timeout_secs == 0 {
        return Err(invalid("timeout_secs", "must be greater than zero"));
    }
    // The rate window needs sample_size seconds to fill
    if config.timeout_secs < config.sample_size as u64 {
        return Err(invalid("timeout_secs", "must be at least sample_size seconds"));
    }
    if !config.max_outstanding_factor.is_finite() || config.max_outstanding_factor <= 0.0 {
        return Err(invalid("max_outstanding_factor", "must be a positive number"));
    }
    Ok(())
}

/// Complete benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuressConfig {
    pub target: TargetConfig,
    pub scenarios: Vec<ScenarioEntry>,
    pub operations: Vec<OperationEntry>,
    pub metrics: Vec<MetricEntry>,
}

impl Default for DuressConfig {
    /// `no-load` / `no-op` / `wallclock`, each named `default`
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            scenarios: vec![ScenarioEntry {
                name: DEFAULT_NAME.to_string(),
                kind: ScenarioKind::NoLoad,
            }],
            operations: vec![OperationEntry {
                name: DEFAULT_NAME.to_string(),
                kind: OperationKind::NoOp,
            }],
            metrics: vec![MetricEntry {
                name: DEFAULT_NAME.to_string(),
                kind: MetricKind::Wallclock,
            }],
        }
    }
}

impl DuressConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.fill_empty_sections();
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            scenarios = config.scenarios.len(),
            operations = config.operations.len(),
            metrics = config.metrics.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load `path` if given, else fall back to the built-in configuration
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("No config file given, using built-in configuration");
                Ok(Self::default())
            }
        }
    }

    /// Apply `DURESS_TARGET` and `DURESS_TIMEOUT_MS` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DURESS_TARGET") {
            self.target.base_url = url;
        }
        if let Some(timeout) = lookup("DURESS_TIMEOUT_MS")
            && let Ok(timeout_ms) = timeout.parse::<u64>()
        {
            self.target.timeout_ms = timeout_ms;
        }
    }

    fn fill_empty_sections(&mut self) {
        let builtin = Self::default();
        if self.scenarios.is_empty() {
            self.scenarios = builtin.scenarios;
        }
        if self.operations.is_empty() {
            self.operations = builtin.operations;
        }
        if self.metrics.is_empty() {
            self.metrics = builtin.metrics;
        }
    }

    /// Check names are unique per section and parameters are in range
    pub fn validate(&self) -> ConfigResult<()> {
        check_unique("scenario", &self.scenarios)?;
        check_unique("operation", &self.operations)?;
        check_unique("metric", &self.metrics)?;

        for entry in &self.scenarios {
            if let Some(config) = entry.kind.request_load() {
                check_request_load(&entry.name, config)?;
            }
        }
        Ok(())
    }

    pub fn scenario(&self, name: &str) -> ConfigResult<&ScenarioEntry> {
        lookup("scenario", &self.scenarios, name)
    }

    pub fn operation(&self, name: &str) -> ConfigResult<&OperationEntry> {
        lookup("operation", &self.operations, name)
    }

    pub fn metric(&self, name: &str) -> ConfigResult<&MetricEntry> {
        lookup("metric", &self.metrics, name)
    }

    pub fn scenario_names(&self) -> Vec<String> {
        names(&self.scenarios)
    }

    pub fn operation_names(&self) -> Vec<String> {
        names(&self.operations)
    }

    pub fn metric_names(&self) -> Vec<String> {
        names(&self.metrics)
    }
}
