//! Baseline scenario that induces nothing

use async_trait::async_trait;
use duress_core::{Condition, HealthMonitor, Scenario, ScenarioResult};
use tracing::debug;

/// Establishes immediately, never collapses and has nothing to tear down
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoad;

impl NoLoad {
    /// Scenario named `name` around this condition
    pub fn scenario(name: impl Into<String>) -> Scenario {
        Scenario::new(name, NoLoad)
    }
}

#[async_trait]
impl Condition for NoLoad {
    async fn establish(&self, _health: HealthMonitor) -> ScenarioResult<()> {
        debug!("No load to establish");
        Ok(())
    }

    async fn teardown(&self) -> ScenarioResult<()> {
        Ok(())
    }
}
