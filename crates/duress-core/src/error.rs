//! Error types for benchmark runs
//!
//! Every failure a run can hit surfaces to the driver's caller as one of
//! these values. Nothing here is retried.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Result type for scenario lifecycle operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// Result type for timed operations
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for calls against the system under test
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while establishing or tearing down a scenario
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ScenarioError {
    /// `start()` was called more than once
    #[error("Scenario already started")]
    AlreadyStarted,

    /// `start()` was called after teardown began
    #[error("Scenario is stopping or stopped")]
    Stopped,

    /// The condition could not be induced
    #[error("Scenario establishment failed: {0}")]
    EstablishFailed(String),

    /// A request-load scenario never reached its target rate
    #[error("Request rate {target}/s not reached within {timeout:?} (measured {measured:.2}/s)")]
    RequestRateNotReached {
        target: u32,
        measured: f64,
        timeout: Duration,
    },

    /// The establishing task was cancelled before it finished
    #[error("Establishment aborted: {0}")]
    Aborted(String),

    /// Scenario-specific teardown failed
    #[error("Scenario teardown failed: {0}")]
    TeardownFailed(String),
}

/// Why an established scenario stopped holding
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum CollapseReason {
    /// Measured request rate fell below the accepted minimum
    #[error("Request rate dropped to {rate:.2}/s (minimum {minimum:.2}/s)")]
    RequestRateTooLow { rate: f64, minimum: f64 },

    /// More requests in flight than the scenario tolerates
    #[error("Too many outstanding requests: {outstanding} (limit {limit})")]
    RequestOverload { outstanding: u64, limit: u64 },

    /// Scenario-specific reason
    #[error("Condition no longer holds: {0}")]
    Other(String),
}

/// Errors from calls against the system under test
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ClientError {
    /// Could not reach the system under test
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The system under test answered with a non-success status
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Any other request failure
    #[error("Request failed: {0}")]
    RequestFailed(String),
}

/// Errors from a single timed operation
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum OperationError {
    #[error("Client call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Operation failed: {0}")]
    Failed(String),
}

/// Why the driver could not get past establishment
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SetupFailure {
    /// The scenario's establishing work failed
    #[error(transparent)]
    Start(#[from] ScenarioError),

    /// The scenario did not establish within the configured limit
    #[error("Scenario not established within {0:?}")]
    TimedOut(Duration),
}

/// Terminal failure of a benchmark run, tagged with the phase it happened in
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum DriverError {
    #[error("Setup failed: {0}")]
    SetupFailure(#[from] SetupFailure),

    #[error("Scenario collapsed during trial {trial}: {reason}")]
    ScenarioCollapse { trial: usize, reason: CollapseReason },

    #[error("Operation failed during trial {trial}: {error}")]
    OperationFailure { trial: usize, error: OperationError },

    #[error("Teardown failed: {0}")]
    TeardownFailure(ScenarioError),
}

impl DriverError {
    /// Trial index the failure was detected at, if it happened during trials
    pub fn trial(&self) -> Option<usize> {
        match self {
            DriverError::ScenarioCollapse { trial, .. }
            | DriverError::OperationFailure { trial, .. } => Some(*trial),
            DriverError::SetupFailure(_) | DriverError::TeardownFailure(_) => None,
        }
    }
}
