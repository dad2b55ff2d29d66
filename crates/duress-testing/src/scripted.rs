//! # Scripted Conditions and Operations
//!
//! Deterministic stand-ins for real scenarios and operations. Both record
//! what happened to them so tests can assert on call counts and on the
//! ordering of establishment, trials and teardown.

use async_trait::async_trait;
use duress_core::{
    CollapseReason, Condition, FakeClock, HealthMonitor, Operation, OperationError,
    OperationResult, ScenarioError, ScenarioResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared, ordered log of lifecycle events
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Snapshot of all events so far
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`Condition`] whose behaviour is fixed up front
///
/// Keep a clone to trigger collapse and inspect counters after handing the
/// condition to a [`duress_core::Scenario`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedCondition {
    establish_delay: Option<Duration>,
    establish_error: Option<ScenarioError>,
    teardown_error: Option<ScenarioError>,
    never_establish: bool,
    journal: Option<Journal>,
    establish_calls: Arc<AtomicUsize>,
    teardown_calls: Arc<AtomicUsize>,
    health: Arc<Mutex<Option<HealthMonitor>>>,
}

impl ScriptedCondition {
    /// Establishes immediately, tears down successfully
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` before establishing
    pub fn with_establish_delay(mut self, delay: Duration) -> Self {
        self.establish_delay = Some(delay);
        self
    }

    /// Fail establishment with `error`
    pub fn failing_establish(mut self, error: ScenarioError) -> Self {
        self.establish_error = Some(error);
        self
    }

    /// Fail teardown with `error`
    pub fn failing_teardown(mut self, error: ScenarioError) -> Self {
        self.teardown_error = Some(error);
        self
    }

    /// Never finish establishing
    pub fn never_establishing(mut self) -> Self {
        self.never_establish = true;
        self
    }

    /// Record `establish` and `teardown` into `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of times `establish` was entered
    pub fn establish_count(&self) -> usize {
        self.establish_calls.load(Ordering::SeqCst)
    }

    /// Number of times `teardown` ran
    pub fn teardown_count(&self) -> usize {
        self.teardown_calls.load(Ordering::SeqCst)
    }

    /// Health handle received from the scenario, once `establish` was entered
    pub fn health(&self) -> Option<HealthMonitor> {
        self.health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Report collapse through the scenario's health handle
    ///
    /// Returns whether the report fired the collapse signal.
    pub fn collapse(&self, reason: CollapseReason) -> bool {
        self.health().is_some_and(|health| health.collapse(reason))
    }

    fn record(&self, entry: &str) {
        if let Some(journal) = &self.journal {
            journal.record(entry);
        }
    }
}

#[async_trait]
impl Condition for ScriptedCondition {
    async fn establish(&self, health: HealthMonitor) -> ScenarioResult<()> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = Some(health);

        if let Some(delay) = self.establish_delay {
            tokio::time::sleep(delay).await;
        }
        if self.never_establish {
            std::future::pending::<()>().await;
        }
        if let Some(error) = &self.establish_error {
            return Err(error.clone());
        }

        self.record("establish");
        Ok(())
    }

    async fn teardown(&self) -> ScenarioResult<()> {
        self.teardown_calls.fetch_add(1, Ordering::SeqCst);
        self.record("teardown");
        match &self.teardown_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// An [`Operation`] advancing a [`FakeClock`] by a fixed step per run
///
/// Runs are numbered from 1, matching driver trial numbers.
#[derive(Debug, Clone)]
pub struct ScriptedOperation {
    name: String,
    clock: FakeClock,
    step: f64,
    fail_at: Option<(usize, OperationError)>,
    collapse_at: Option<(usize, ScriptedCondition, CollapseReason)>,
    journal: Option<Journal>,
    runs: Arc<AtomicUsize>,
}

impl ScriptedOperation {
    /// Operation advancing `clock` by `step` seconds per run
    pub fn new(clock: FakeClock, step: f64) -> Self {
        Self {
            name: "scripted".to_string(),
            clock,
            step,
            fail_at: None,
            collapse_at: None,
            journal: None,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail run number `run` with `error`
    pub fn failing_at(mut self, run: usize, error: OperationError) -> Self {
        self.fail_at = Some((run, error));
        self
    }

    /// On run number `run`, collapse `condition` and never complete
    pub fn collapsing_at(
        mut self,
        run: usize,
        condition: ScriptedCondition,
        reason: CollapseReason,
    ) -> Self {
        self.collapse_at = Some((run, condition, reason));
        self
    }

    /// Record each completed run as `trial <n>` into `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of runs started
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation for ScriptedOperation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> OperationResult<()> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some((at, condition, reason)) = &self.collapse_at {
            if *at == run {
                condition.collapse(reason.clone());
                std::future::pending::<()>().await;
            }
        }
        if let Some((at, error)) = &self.fail_at {
            if *at == run {
                return Err(error.clone());
            }
        }

        tokio::task::yield_now().await;
        self.clock.advance(self.step);
        if let Some(journal) = &self.journal {
            journal.record(format!("trial {run}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duress_core::{Clock, Scenario};

    #[tokio::test]
    async fn test_scripted_operation_advances_clock() {
        let clock = FakeClock::new();
        let operation = ScriptedOperation::new(clock.clone(), 0.5);

        operation.run().await.unwrap();
        operation.run().await.unwrap();
        assert_eq!(clock.seconds(), 1.0);
        assert_eq!(operation.run_count(), 2);
    }

    #[tokio::test]
    async fn test_scripted_operation_fails_on_requested_run() {
        let operation = ScriptedOperation::new(FakeClock::new(), 0.1)
            .failing_at(2, OperationError::Failed("scripted".to_string()));

        assert!(operation.run().await.is_ok());
        assert_eq!(
            operation.run().await,
            Err(OperationError::Failed("scripted".to_string()))
        );
        assert!(operation.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_condition_reports_collapse() {
        let journal = Journal::new();
        let condition = ScriptedCondition::new().with_journal(journal.clone());
        let scenario = Scenario::new("scripted", condition.clone());

        assert!(!condition.collapse(CollapseReason::Other("not started".to_string())));
        scenario.start().await.unwrap();
        let signal = scenario.maintained();
        assert!(condition.collapse(CollapseReason::Other("down".to_string())));
        assert_eq!(signal.await, CollapseReason::Other("down".to_string()));

        scenario.stop().await.unwrap();
        assert_eq!(condition.establish_count(), 1);
        assert_eq!(condition.teardown_count(), 1);
        assert_eq!(journal.entries(), vec!["establish", "teardown"]);
    }
}
