//! Property-Based Tests for Driver Runs and Event Fan-out
//!
//! These properties hold regardless of trial count, sample cost or the
//! trial at which a run fails.

use duress::{
    ClockMeasurement, CollapseReason, Driver, DriverConfig, DriverError, EventChannel, FakeClock,
    OperationError, Scenario,
};
use duress_testing::{ScriptedCondition, ScriptedOperation};
use proptest::prelude::*;
use std::sync::Arc;

// Costs that are exact in binary floating point, so samples compare equal
fn step_strategy() -> impl Strategy<Value = f64> {
    (1u32..=64).prop_map(|n| f64::from(n) / 8.0)
}

fn driver(clock: &FakeClock, samples: usize) -> Driver {
    Driver::new(
        DriverConfig {
            samples,
            setup_timeout: None,
        },
        Arc::new(ClockMeasurement::new("fake", Arc::new(clock.clone()))),
    )
}

proptest! {
    /// Property: a clean run yields exactly one sample per trial, each equal
    /// to the operation's cost, and tears the scenario down once
    #[test]
    fn prop_clean_run_collects_every_trial(samples in 0usize..32, step in step_strategy()) {
        tokio_test::block_on(async {
            let clock = FakeClock::new();
            let condition = ScriptedCondition::new();
            let operation = ScriptedOperation::new(clock.clone(), step);

            let report = driver(&clock, samples)
                .run(Scenario::new("steady", condition.clone()), Arc::new(operation.clone()))
                .await;

            prop_assert!(report.is_success());
            prop_assert_eq!(report.samples.len(), samples);
            prop_assert!(report.samples.iter().all(|sample| *sample == step));
            prop_assert_eq!(operation.run_count(), samples);
            prop_assert_eq!(condition.establish_count(), 1);
            prop_assert_eq!(condition.teardown_count(), 1);
            Ok(())
        })?;
    }

    /// Property: a failure at trial k keeps exactly the k - 1 earlier samples
    /// and never runs a later trial
    #[test]
    fn prop_operation_failure_truncates_samples(
        (samples, failing) in (1usize..24).prop_flat_map(|n| (Just(n), 1..=n))
    ) {
        tokio_test::block_on(async {
            let clock = FakeClock::new();
            let condition = ScriptedCondition::new();
            let error = OperationError::Failed("scripted".to_string());
            let operation = ScriptedOperation::new(clock.clone(), 0.25)
                .failing_at(failing, error.clone());

            let report = driver(&clock, samples)
                .run(Scenario::new("steady", condition.clone()), Arc::new(operation.clone()))
                .await;

            prop_assert_eq!(report.samples.len(), failing - 1);
            prop_assert_eq!(
                report.failure,
                Some(DriverError::OperationFailure { trial: failing, error })
            );
            prop_assert_eq!(operation.run_count(), failing);
            prop_assert_eq!(condition.teardown_count(), 1);
            Ok(())
        })?;
    }

    /// Property: a collapse during trial k fails the run at k, however many
    /// trials were requested
    #[test]
    fn prop_collapse_reported_at_its_trial(
        (samples, collapsing) in (1usize..24).prop_flat_map(|n| (Just(n), 1..=n))
    ) {
        tokio_test::block_on(async {
            let clock = FakeClock::new();
            let condition = ScriptedCondition::new();
            let reason = CollapseReason::RequestOverload { outstanding: 9, limit: 4 };
            let operation = ScriptedOperation::new(clock.clone(), 0.25)
                .collapsing_at(collapsing, condition.clone(), reason.clone());

            let report = driver(&clock, samples)
                .run(Scenario::new("fragile", condition.clone()), Arc::new(operation))
                .await;

            prop_assert_eq!(report.samples.len(), collapsing - 1);
            prop_assert_eq!(
                report.failure,
                Some(DriverError::ScenarioCollapse { trial: collapsing, reason })
            );
            prop_assert_eq!(condition.teardown_count(), 1);
            Ok(())
        })?;
    }

    /// Property: one publish reaches every live subscription exactly once,
    /// and cancelled ones not at all
    #[test]
    fn prop_publish_reaches_live_subscribers(
        cancelled in prop::collection::vec(any::<bool>(), 0..64),
        value in any::<u32>()
    ) {
        tokio_test::block_on(async {
            let channel: EventChannel<u32, String> = EventChannel::new();
            let mut subscriptions: Vec<_> = cancelled.iter().map(|_| channel.subscribe()).collect();
            for (subscription, cancel) in subscriptions.iter_mut().zip(&cancelled) {
                if *cancel {
                    subscription.cancel();
                }
            }
            let live = cancelled.iter().filter(|cancel| !**cancel).count();

            prop_assert_eq!(channel.publish_success(value), live);
            prop_assert_eq!(channel.pending(), 0);
            for (subscription, cancel) in subscriptions.into_iter().zip(&cancelled) {
                if !*cancel {
                    prop_assert_eq!(subscription.await, Ok(value));
                }
            }

            // Nothing is left for a second publish
            prop_assert_eq!(channel.publish_failure("late".to_string()), 0);
            Ok(())
        })?;
    }
}
