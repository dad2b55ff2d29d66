//! Benchmark execution and result output

use chrono::{DateTime, Utc};
use clap::Args;
use duress_core::{Client, ClientError, Driver, DriverConfig, DriverError, RunReport, ScenarioError};
use duress_load::{ConfigError, DuressConfig, HttpClient};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors that stop the CLI before or after a run
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create client: {0}")]
    Client(#[from] ClientError),

    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Options for a single benchmark run
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Base URL of the system under test [default: from config, else http://127.0.0.1:8080]
    #[arg(long)]
    pub target: Option<String>,

    /// Scenario to hold during the run
    #[arg(long, default_value = "default")]
    pub scenario: String,

    /// Operation to time
    #[arg(long, default_value = "default")]
    pub operation: String,

    /// Measurement strategy
    #[arg(long, default_value = "default")]
    pub metric: String,

    /// Number of trials
    #[arg(long, default_value_t = 3)]
    pub samples: usize,

    /// Give up if the scenario is not established in time (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub setup_timeout: Option<Duration>,

    /// Write the JSON result here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            target: None,
            scenario: "default".to_string(),
            operation: "default".to_string(),
            metric: "default".to_string(),
            samples: 3,
            setup_timeout: None,
            output: None,
        }
    }
}

/// JSON document printed for every run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub scenario: String,
    pub operation: String,
    pub metric: String,
    pub timestamp: DateTime<Utc>,
    pub samples: Vec<f64>,
    pub failure: Option<DriverError>,
    pub teardown_failure: Option<ScenarioError>,
}

impl RunOutput {
    pub fn new(report: RunReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            scenario: report.scenario,
            operation: report.operation,
            metric: report.metric,
            timestamp,
            samples: report.samples,
            failure: report.failure,
            teardown_failure: report.teardown_failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.teardown_failure.is_none()
    }
}

/// Resolve the configured entries and execute one run
pub async fn run_benchmark(config: &DuressConfig, args: &RunArgs) -> Result<RunOutput, CliError> {
    let scenario = config.scenario(&args.scenario)?;
    let operation = config.operation(&args.operation)?;
    let measurement = config.metric(&args.metric)?.build()?;

    let mut target = config.target.clone();
    if let Some(url) = &args.target {
        target.base_url = url.clone();
    }
    let client: Arc<dyn Client> = Arc::new(HttpClient::new(&target)?);

    info!(
        target = %target.base_url,
        scenario = %scenario.name,
        scenario_type = scenario.kind.type_name(),
        operation = %operation.name,
        operation_type = operation.kind.type_name(),
        "Resolved benchmark"
    );

    let driver = Driver::new(
        DriverConfig {
            samples: args.samples,
            setup_timeout: args.setup_timeout,
        },
        measurement,
    );

    let timestamp = Utc::now();
    let report = driver
        .run(scenario.build(Arc::clone(&client)), operation.build(client))
        .await;
    Ok(RunOutput::new(report, timestamp))
}

/// Write `output` as pretty JSON to `path`, or stdout when `None`
pub fn write_output(output: &RunOutput, path: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(output)?;
    match path {
        Some(path) => fs::write(path, format!("{json}\n")).map_err(|source| CliError::Output {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

/// Human-readable listing of configured names
pub fn list(config: &DuressConfig) -> String {
    let mut listing = String::new();
    let sections = [
        (
            "Scenarios",
            config
                .scenarios
                .iter()
                .map(|entry| (entry.name.as_str(), entry.kind.type_name()))
                .collect::<Vec<_>>(),
        ),
        (
            "Operations",
            config
                .operations
                .iter()
                .map(|entry| (entry.name.as_str(), entry.kind.type_name()))
                .collect(),
        ),
        (
            "Metrics",
            config
                .metrics
                .iter()
                .map(|entry| (entry.name.as_str(), entry.kind.type_name()))
                .collect(),
        ),
    ];

    for (title, entries) in sections {
        listing.push_str(title);
        listing.push_str(":\n");
        for (name, kind) in entries {
            listing.push_str(&format!("  {name} ({kind})\n"));
        }
    }
    listing
}
