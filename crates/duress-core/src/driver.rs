//! Benchmark driver
//!
//! The [`Driver`] owns one run: it starts the scenario, waits for it to be
//! established, then times the operation once per trial while racing each
//! measurement against the scenario's collapse signal. The scenario is
//! stopped on every exit path.

use crate::error::{DriverError, ScenarioError, ScenarioResult, SetupFailure};
use crate::measurement::Measurement;
use crate::operation::Operation;
use crate::scenario::Scenario;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Driver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Number of trials to run
    pub samples: usize,
    /// Upper bound on establishment; `None` waits indefinitely
    pub setup_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            setup_timeout: None,
        }
    }
}

/// Outcome of a single benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub operation: String,
    pub metric: String,
    /// Trials requested
    pub trials: usize,
    /// Seconds per completed trial, in trial order
    pub samples: Vec<f64>,
    /// First failure of the run, tagged with its phase
    pub failure: Option<DriverError>,
    /// Teardown failure, reported even when `failure` is set
    pub teardown_failure: Option<ScenarioError>,
}

impl RunReport {
    /// Whether every trial completed and teardown succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.teardown_failure.is_none()
    }

    /// Collapse the report into the samples or the most relevant failure
    ///
    /// A failure from before teardown takes precedence over a teardown
    /// failure.
    pub fn into_result(self) -> Result<Vec<f64>, DriverError> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        if let Some(error) = self.teardown_failure {
            return Err(DriverError::TeardownFailure(error));
        }
        Ok(self.samples)
    }
}

/// Runs operations against an established scenario
pub struct Driver {
    config: DriverConfig,
    measurement: Arc<dyn Measurement>,
}

impl Driver {
    pub fn new(config: DriverConfig, measurement: Arc<dyn Measurement>) -> Self {
        Self {
            config,
            measurement,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Execute one run of `operation` under `scenario`
    ///
    /// Never retries. Consumes the scenario: it is stopped before this
    /// returns, or in the background if the returned future is dropped early.
    pub async fn run(&self, scenario: Scenario, operation: Arc<dyn Operation>) -> RunReport {
        info!(
            scenario = scenario.name(),
            operation = operation.name(),
            metric = self.measurement.name(),
            samples = self.config.samples,
            "Starting benchmark run"
        );

        let mut report = RunReport {
            scenario: scenario.name().to_string(),
            operation: operation.name().to_string(),
            metric: self.measurement.name().to_string(),
            trials: self.config.samples,
            samples: Vec::with_capacity(self.config.samples),
            failure: None,
            teardown_failure: None,
        };

        let guard = ScenarioGuard::new(scenario.clone());
        if let Err(error) = self
            .execute(&scenario, operation.as_ref(), &mut report.samples)
            .await
        {
            warn!(
                scenario = scenario.name(),
                %error,
                completed = report.samples.len(),
                "Benchmark run failed"
            );
            report.failure = Some(error);
        }

        if let Err(error) = guard.release().await {
            report.teardown_failure = Some(error);
        }

        info!(
            scenario = scenario.name(),
            completed = report.samples.len(),
            success = report.is_success(),
            "Benchmark run finished"
        );
        report
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        operation: &dyn Operation,
        samples: &mut Vec<f64>,
    ) -> Result<(), DriverError> {
        self.establish(scenario).await?;

        for trial in 1..=self.config.samples {
            // A fresh signal per trial; the loser of each race is dropped
            let collapse = scenario.maintained();
            let sample = tokio::select! {
                biased;
                reason = collapse => Err(DriverError::ScenarioCollapse { trial, reason }),
                measured = self.measurement.measure(operation) => {
                    measured.map_err(|error| DriverError::OperationFailure { trial, error })
                }
            }?;

            debug!(trial, sample, "Trial completed");
            samples.push(sample);
        }

        Ok(())
    }

    async fn establish(&self, scenario: &Scenario) -> Result<(), SetupFailure> {
        let start = scenario.start();
        let established = scenario.established();

        let wait = async move {
            tokio::select! {
                biased;
                () = established => Ok(()),
                // The establishing task publishes before it returns
                result = start => result.map_err(SetupFailure::from),
            }
        };

        let outcome = match self.config.setup_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SetupFailure::TimedOut(limit)),
            },
            None => wait.await,
        };

        if outcome.is_ok() {
            debug!(scenario = scenario.name(), "Scenario ready for trials");
        }
        outcome
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("measurement", &self.measurement.name())
            .finish()
    }
}

/// Stops the scenario when the run ends, however it ends
struct ScenarioGuard {
    scenario: Option<Scenario>,
}

impl ScenarioGuard {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario: Some(scenario),
        }
    }

    async fn release(mut self) -> ScenarioResult<()> {
        let result = match &self.scenario {
            Some(scenario) => scenario.stop().await,
            None => Ok(()),
        };
        self.scenario = None;
        result
    }
}

impl Drop for ScenarioGuard {
    fn drop(&mut self) {
        let Some(scenario) = self.scenario.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    scenario = scenario.name(),
                    "Run abandoned before teardown, stopping scenario in background"
                );
                handle.spawn(async move {
                    if let Err(error) = scenario.stop().await {
                        warn!(scenario = scenario.name(), %error, "Background teardown failed");
                    }
                });
            }
            Err(_) => warn!(
                scenario = scenario.name(),
                "No runtime available, scenario left running"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::error::{CollapseReason, OperationError, OperationResult};
    use crate::measurement::ClockMeasurement;
    use crate::scenario::{Condition, HealthMonitor, ScenarioState};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Establish {
        Immediately,
        Never,
        Fail,
    }

    #[derive(Clone)]
    struct Probe {
        establish: Establish,
        fail_teardown: bool,
        teardown_delay: Option<Duration>,
        teardowns: Arc<AtomicUsize>,
        health: Arc<Mutex<Option<HealthMonitor>>>,
    }

    impl Probe {
        fn new(establish: Establish) -> Self {
            Self {
                establish,
                fail_teardown: false,
                teardown_delay: None,
                teardowns: Arc::new(AtomicUsize::new(0)),
                health: Arc::new(Mutex::new(None)),
            }
        }

        fn teardowns(&self) -> usize {
            self.teardowns.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Condition for Probe {
        async fn establish(&self, health: HealthMonitor) -> ScenarioResult<()> {
            *self.health.lock().unwrap() = Some(health);
            match self.establish {
                Establish::Immediately => Ok(()),
                Establish::Never => std::future::pending().await,
                Establish::Fail => Err(ScenarioError::EstablishFailed("port busy".to_string())),
            }
        }

        async fn teardown(&self) -> ScenarioResult<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.teardown_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_teardown {
                return Err(ScenarioError::TeardownFailed("leaked workers".to_string()));
            }
            Ok(())
        }
    }

    /// Advances the clock each run; on `collapse_on` reports collapse and hangs
    struct Step {
        clock: FakeClock,
        runs: AtomicUsize,
        collapse_on: Option<(usize, Arc<Mutex<Option<HealthMonitor>>>)>,
    }

    #[async_trait]
    impl Operation for Step {
        fn name(&self) -> &str {
            "step"
        }

        async fn run(&self) -> OperationResult<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((trial, health)) = &self.collapse_on {
                if *trial == run {
                    let health = health.lock().unwrap().clone();
                    if let Some(health) = health {
                        health.collapse(CollapseReason::Other("backend gone".to_string()));
                    }
                    return std::future::pending().await;
                }
            }
            self.clock.advance(0.25);
            Ok(())
        }
    }

    fn driver(clock: &FakeClock, config: DriverConfig) -> Driver {
        Driver::new(
            config,
            Arc::new(ClockMeasurement::new("fake", Arc::new(clock.clone()))),
        )
    }

    fn step(clock: &FakeClock) -> Arc<Step> {
        Arc::new(Step {
            clock: clock.clone(),
            runs: AtomicUsize::new(0),
            collapse_on: None,
        })
    }

    #[tokio::test]
    async fn test_run_collects_samples_in_order() {
        let clock = FakeClock::new();
        let probe = Probe::new(Establish::Immediately);
        let scenario = Scenario::new("steady", probe.clone());

        let report = driver(&clock, DriverConfig::default())
            .run(scenario, step(&clock))
            .await;

        assert_eq!(report.samples, vec![0.25, 0.25, 0.25]);
        assert_eq!(report.trials, 3);
        assert_eq!(report.operation, "step");
        assert!(report.is_success());
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test]
    async fn test_zero_trials_still_establishes_and_stops() {
        let clock = FakeClock::new();
        let probe = Probe::new(Establish::Immediately);
        let config = DriverConfig {
            samples: 0,
            ..Default::default()
        };

        let report = driver(&clock, config)
            .run(Scenario::new("empty", probe.clone()), step(&clock))
            .await;

        assert_eq!(report.into_result(), Ok(vec![]));
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_is_setup_failure() {
        let clock = FakeClock::new();
        let probe = Probe::new(Establish::Fail);

        let report = driver(&clock, DriverConfig::default())
            .run(Scenario::new("broken", probe.clone()), step(&clock))
            .await;

        assert_eq!(
            report.failure,
            Some(DriverError::SetupFailure(SetupFailure::Start(
                ScenarioError::EstablishFailed("port busy".to_string())
            )))
        );
        assert!(report.samples.is_empty());
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_timeout_tears_down() {
        let clock = FakeClock::new();
        let probe = Probe::new(Establish::Never);
        let config = DriverConfig {
            samples: 3,
            setup_timeout: Some(Duration::from_secs(5)),
        };

        let report = driver(&clock, config)
            .run(Scenario::new("stalled", probe.clone()), step(&clock))
            .await;

        assert_eq!(
            report.failure,
            Some(DriverError::SetupFailure(SetupFailure::TimedOut(
                Duration::from_secs(5)
            )))
        );
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test]
    async fn test_teardown_failure_reported_alongside_collapse() {
        let clock = FakeClock::new();
        let mut probe = Probe::new(Establish::Immediately);
        probe.fail_teardown = true;
        let operation = Arc::new(Step {
            clock: clock.clone(),
            runs: AtomicUsize::new(0),
            collapse_on: Some((2, Arc::clone(&probe.health))),
        });

        let report = driver(&clock, DriverConfig::default())
            .run(Scenario::new("flaky", probe.clone()), operation)
            .await;

        assert_eq!(report.samples, vec![0.25]);
        assert_eq!(
            report.failure,
            Some(DriverError::ScenarioCollapse {
                trial: 2,
                reason: CollapseReason::Other("backend gone".to_string()),
            })
        );
        assert_eq!(
            report.teardown_failure,
            Some(ScenarioError::TeardownFailed("leaked workers".to_string()))
        );
        assert!(matches!(
            report.into_result(),
            Err(DriverError::ScenarioCollapse { trial: 2, .. })
        ));
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test]
    async fn test_teardown_failure_alone_becomes_result() {
        let clock = FakeClock::new();
        let mut probe = Probe::new(Establish::Immediately);
        probe.fail_teardown = true;

        let report = driver(&clock, DriverConfig::default())
            .run(Scenario::new("leaky", probe), step(&clock))
            .await;

        assert_eq!(report.samples.len(), 3);
        assert!(matches!(
            report.into_result(),
            Err(DriverError::TeardownFailure(ScenarioError::TeardownFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_abandoned_run_stops_scenario_in_background() {
        let clock = FakeClock::new();
        let probe = Probe::new(Establish::Never);
        let scenario = Scenario::new("abandoned", probe.clone());
        let driver = driver(&clock, DriverConfig::default());
        let operation = step(&clock);

        let run = tokio::spawn(async move { driver.run(scenario, operation).await });
        tokio::time::timeout(Duration::from_secs(5), async {
            while probe.health.lock().unwrap().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        tokio::time::timeout(Duration::from_secs(5), async {
            while probe.teardowns() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(probe.teardowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_abandoned_mid_teardown_tears_down_once() {
        let clock = FakeClock::new();
        let probe = Probe {
            teardown_delay: Some(Duration::from_secs(1)),
            ..Probe::new(Establish::Immediately)
        };
        let scenario = Scenario::new("slow-teardown", probe.clone());
        let handle = scenario.clone();
        let driver = driver(&clock, DriverConfig::default());
        let operation = step(&clock);

        let run = tokio::spawn(async move { driver.run(scenario, operation).await });
        while probe.teardowns() == 0 {
            tokio::task::yield_now().await;
        }
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        assert_eq!(handle.stop().await, Ok(()));
        assert_eq!(handle.state(), ScenarioState::Stopped);
        assert_eq!(probe.teardowns(), 1);
    }

    #[test]
    fn test_report_serializes_failure_tag() {
        let report = RunReport {
            scenario: "s".to_string(),
            operation: "o".to_string(),
            metric: "m".to_string(),
            trials: 3,
            samples: vec![0.5],
            failure: Some(DriverError::OperationFailure {
                trial: 2,
                error: OperationError::Failed("timeout".to_string()),
            }),
            teardown_failure: None,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["samples"][0], 0.5);
        assert_eq!(json["failure"]["OperationFailure"]["trial"], 2);
        assert!(json["teardown_failure"].is_null());
    }
}
