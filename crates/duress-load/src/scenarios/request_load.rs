//! Synthetic request load held at a target rate
//!
//! A generator task issues `request_rate` requests per second against the
//! shared [`Client`]. Completions are sampled once per second into a
//! [`RateMeasurer`]; the scenario is established once a full window averages
//! at least `request_rate × (1 − tolerance)`. From then on a monitor task
//! keeps sampling and reports collapse when the rate drops below that
//! threshold or too many requests are left hanging.

use crate::rate::{LoadCounters, RateMeasurer};
use async_trait::async_trait;
use duress_core::{
    Client, CollapseReason, Condition, HealthMonitor, Scenario, ScenarioError, ScenarioResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, trace};

const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// Body sent by write requests unless configured otherwise
pub const DEFAULT_PAYLOAD: &str = r#"{"source":"duress"}"#;

/// Which client call the generator issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Read,
    Write,
}

/// Request-load parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLoadConfig {
    /// Requests issued per second
    pub request_rate: u32,
    /// Seconds in the sliding rate window
    pub sample_size: usize,
    /// Accepted shortfall, as a fraction of `request_rate`
    pub tolerance: f64,
    /// Seconds allowed to reach the target rate
    pub timeout_secs: u64,
    /// Outstanding requests tolerated, as a multiple of `request_rate`
    pub max_outstanding_factor: f64,
    /// Body of write requests
    pub payload: String,
}

impl Default for RequestLoadConfig {
    fn default() -> Self {
        Self {
            request_rate: 10,
            sample_size: 5,
            tolerance: 0.1,
            timeout_secs: 30,
            max_outstanding_factor: 2.0,
            payload: DEFAULT_PAYLOAD.to_string(),
        }
    }
}

impl RequestLoadConfig {
    /// Lowest measured rate that still counts as holding the load
    pub fn minimum_rate(&self) -> f64 {
        f64::from(self.request_rate) * (1.0 - self.tolerance)
    }

    /// Highest number of in-flight requests before the load counts as overloaded
    pub fn outstanding_limit(&self) -> u64 {
        (f64::from(self.request_rate) * self.max_outstanding_factor).ceil() as u64
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.request_rate.max(1)))
    }
}

/// Condition generating read or write requests at a fixed rate
pub struct RequestLoad {
    kind: RequestKind,
    config: RequestLoadConfig,
    client: Arc<dyn Client>,
    counters: Arc<LoadCounters>,
}

impl RequestLoad {
    pub fn new(kind: RequestKind, config: RequestLoadConfig, client: Arc<dyn Client>) -> Self {
        Self {
            kind,
            config,
            client,
            counters: Arc::new(LoadCounters::new()),
        }
    }

    /// Wrap this condition in a scenario named `name`
    pub fn into_scenario(self, name: impl Into<String>) -> Scenario {
        Scenario::new(name, self)
    }

    /// Counters updated by the generator
    pub fn counters(&self) -> Arc<LoadCounters> {
        Arc::clone(&self.counters)
    }

    pub fn config(&self) -> &RequestLoadConfig {
        &self.config
    }

    fn sample(&self, measurer: &mut RateMeasurer) -> f64 {
        measurer.record_total(self.counters.completed());
        measurer.tick();
        measurer.rate()
    }
}

#[async_trait]
impl Condition for RequestLoad {
    async fn establish(&self, health: HealthMonitor) -> ScenarioResult<()> {
        let generator = tokio::spawn(generate(
            Arc::clone(&self.client),
            self.kind,
            Arc::from(self.config.payload.as_str()),
            self.config.period(),
            Arc::clone(&self.counters),
        ));
        health.track(generator);
        info!(
            kind = ?self.kind,
            rate = self.config.request_rate,
            window = self.config.sample_size,
            "Request load started"
        );

        let minimum = self.config.minimum_rate();
        let deadline = Instant::now() + self.config.timeout();
        let mut measurer = RateMeasurer::new(self.config.sample_size);
        let mut sampler = interval_at(Instant::now() + SAMPLE_PERIOD, SAMPLE_PERIOD);
        sampler.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            sampler.tick().await;
            let rate = self.sample(&mut measurer);
            debug!(rate, minimum, full = measurer.is_full(), "Sampled request rate");

            if measurer.is_full() && rate >= minimum {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ScenarioError::RequestRateNotReached {
                    target: self.config.request_rate,
                    measured: rate,
                    timeout: self.config.timeout(),
                });
            }
        }

        let monitor = tokio::spawn(watch(
            health.clone(),
            measurer,
            sampler,
            Arc::clone(&self.counters),
            minimum,
            self.config.outstanding_limit(),
        ));
        health.track(monitor);
        Ok(())
    }

    async fn teardown(&self) -> ScenarioResult<()> {
        info!(
            issued = self.counters.issued(),
            completed = self.counters.completed(),
            errors = self.counters.errors(),
            outstanding = self.counters.outstanding(),
            "Request load stopped"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RequestLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLoad")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

async fn generate(
    client: Arc<dyn Client>,
    kind: RequestKind,
    payload: Arc<str>,
    period: Duration,
    counters: Arc<LoadCounters>,
) {
    let mut ticker = interval(period);
    // Dropped with the generator, which aborts whatever is still in flight
    let mut inflight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let client = Arc::clone(&client);
                let payload = Arc::clone(&payload);
                let counters = Arc::clone(&counters);
                counters.record_issued();
                inflight.spawn(async move {
                    let result = match kind {
                        RequestKind::Read => client.read().await,
                        RequestKind::Write => client.write(&payload).await,
                    };
                    match result {
                        Ok(()) => counters.record_completed(),
                        Err(error) => {
                            trace!(%error, "Load request failed");
                            counters.record_error();
                        }
                    }
                });
            }
            Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
        }
    }
}

async fn watch(
    health: HealthMonitor,
    mut measurer: RateMeasurer,
    mut sampler: Interval,
    counters: Arc<LoadCounters>,
    minimum: f64,
    limit: u64,
) {
    loop {
        sampler.tick().await;
        measurer.record_total(counters.completed());
        measurer.tick();

        let outstanding = counters.outstanding();
        let rate = measurer.rate();
        trace!(rate, outstanding, "Monitoring request load");

        let reason = if outstanding > limit {
            Some(CollapseReason::RequestOverload { outstanding, limit })
        } else if rate < minimum {
            Some(CollapseReason::RequestRateTooLow { rate, minimum })
        } else {
            None
        };

        // Done once reported, or once nobody can receive a report
        if let Some(reason) = reason
            && (health.collapse(reason) || !health.is_armed())
        {
            break;
        }
    }
}
