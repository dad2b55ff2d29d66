//! Scenario lifecycle state machine
//!
//! A [`Scenario`] drives a scenario-specific [`Condition`] (synthetic load,
//! a degraded dependency, ...) through
//! `Starting → Established → Maintaining → Stopping → Stopped` and publishes
//! two single-fire signals on top of [`EventChannel`]s:
//!
//! - [`Scenario::established`] resolves once the condition holds.
//! - [`Scenario::maintained`] resolves with a [`CollapseReason`] if it stops
//!   holding. It is armed once for the scenario's whole lifetime.
//!
//! Conditions report collapse and register their monitoring tasks through
//! the [`HealthMonitor`] they receive in [`Condition::establish`]. Once
//! [`Scenario::stop`] begins, monitoring tasks are aborted and collapse
//! reports are ignored.

use crate::channel::EventChannel;
use crate::error::{CollapseReason, ScenarioError, ScenarioResult};
use crate::signal::{Collapse, Establishment};
use async_trait::async_trait;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::task::{Context, Poll, ready};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Lifecycle state of a [`Scenario`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioState {
    Starting,
    Established,
    /// Established and being watched for collapse
    Maintaining,
    Stopping,
    Stopped,
}

impl ScenarioState {
    /// Whether the condition is currently expected to hold
    pub fn is_established(self) -> bool {
        matches!(self, ScenarioState::Established | ScenarioState::Maintaining)
    }

    /// Whether teardown has begun
    pub fn is_stopping(self) -> bool {
        matches!(self, ScenarioState::Stopping | ScenarioState::Stopped)
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioState::Starting => "starting",
            ScenarioState::Established => "established",
            ScenarioState::Maintaining => "maintaining",
            ScenarioState::Stopping => "stopping",
            ScenarioState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Scenario-specific behaviour plugged into a [`Scenario`]
#[async_trait]
pub trait Condition: Send + Sync + 'static {
    /// Induce the condition and return once it holds
    ///
    /// Long-running generators and health checks should be spawned and
    /// registered with [`HealthMonitor::track`] so teardown can cancel them.
    async fn establish(&self, health: HealthMonitor) -> ScenarioResult<()>;

    /// Undo whatever `establish` set up
    ///
    /// Called at most once, possibly without `establish` having finished.
    async fn teardown(&self) -> ScenarioResult<()>;
}

struct Lifecycle {
    state: ScenarioState,
    started: bool,
    established: bool,
    collapsed: Option<CollapseReason>,
    establishing: Option<AbortHandle>,
    monitors: Vec<AbortHandle>,
}

struct Shared {
    name: String,
    lifecycle: Mutex<Lifecycle>,
    establishment: EventChannel<(), Infallible>,
    collapse: EventChannel<Infallible, CollapseReason>,
    condition: Box<dyn Condition>,
    /// Set by the first `stop()`; the teardown task publishes its result here
    teardown: OnceLock<watch::Receiver<Option<ScenarioResult<()>>>>,
}

impl Shared {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, lifecycle: &mut Lifecycle, to: ScenarioState) {
        debug!(
            scenario = %self.name,
            from = %lifecycle.state,
            to = %to,
            "Scenario state transition"
        );
        lifecycle.state = to;
    }

    fn mark_established(&self) {
        let mut lifecycle = self.lifecycle();
        lifecycle.establishing = None;
        if lifecycle.state != ScenarioState::Starting {
            return;
        }

        self.transition(&mut lifecycle, ScenarioState::Established);
        lifecycle.established = true;
        let notified = self.establishment.publish_success(());
        info!(scenario = %self.name, notified, "Scenario established");
    }

    fn report_collapse(&self, reason: CollapseReason) -> bool {
        // Publishing under the lifecycle lock keeps stop() from slipping in
        // between the state check and delivery.
        let mut lifecycle = self.lifecycle();
        if !lifecycle.state.is_established() || lifecycle.collapsed.is_some() {
            return false;
        }

        lifecycle.collapsed = Some(reason.clone());
        let notified = self.collapse.publish_failure(reason.clone());
        warn!(scenario = %self.name, %reason, notified, "Scenario collapsed");
        true
    }

    /// Disarm collapse, cancel background work and run the condition's teardown
    async fn shut_down(&self) -> ScenarioResult<()> {
        {
            let mut lifecycle = self.lifecycle();
            self.transition(&mut lifecycle, ScenarioState::Stopping);
            if let Some(task) = lifecycle.establishing.take() {
                task.abort();
            }
            let monitors = lifecycle.monitors.len();
            for monitor in lifecycle.monitors.drain(..) {
                monitor.abort();
            }
            debug!(scenario = %self.name, monitors, "Cancelled scenario monitors");
        }

        let result = self.condition.teardown().await;
        {
            let mut lifecycle = self.lifecycle();
            self.transition(&mut lifecycle, ScenarioState::Stopped);
        }

        match &result {
            Ok(()) => info!(scenario = %self.name, "Scenario stopped"),
            Err(error) => warn!(scenario = %self.name, %error, "Scenario teardown failed"),
        }
        result
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Last handle gone without stop(): nothing may keep generating load
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = lifecycle.establishing.take() {
            task.abort();
        }
        for monitor in lifecycle.monitors.drain(..) {
            monitor.abort();
        }
    }
}

/// Handle a [`Condition`] uses to report on the scenario it belongs to
#[derive(Clone)]
pub struct HealthMonitor {
    shared: Weak<Shared>,
}

impl HealthMonitor {
    /// Report that the condition no longer holds
    ///
    /// Only the first report while established is delivered. Returns whether
    /// this report fired the scenario's collapse signal.
    pub fn collapse(&self, reason: CollapseReason) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.report_collapse(reason))
    }

    /// Whether a collapse report would currently be delivered
    pub fn is_armed(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| {
            let lifecycle = shared.lifecycle();
            lifecycle.state.is_established() && lifecycle.collapsed.is_none()
        })
    }

    /// Register a background task to be aborted when the scenario stops
    ///
    /// A task registered after teardown began is aborted immediately.
    pub fn track(&self, task: JoinHandle<()>) {
        let Some(shared) = self.shared.upgrade() else {
            task.abort();
            return;
        };

        let mut lifecycle = shared.lifecycle();
        if lifecycle.state.is_stopping() {
            task.abort();
        } else {
            lifecycle.monitors.push(task.abort_handle());
        }
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Outcome of the establishing work started by [`Scenario::start`]
#[must_use = "dropping the handle does not cancel establishment"]
pub struct StartHandle {
    inner: StartInner,
}

enum StartInner {
    Running(JoinHandle<ScenarioResult<()>>),
    Finished(Option<ScenarioResult<()>>),
}

impl StartHandle {
    fn finished(result: ScenarioResult<()>) -> Self {
        Self {
            inner: StartInner::Finished(Some(result)),
        }
    }
}

impl Future for StartHandle {
    type Output = ScenarioResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            StartInner::Running(task) => {
                let joined = ready!(Pin::new(task).poll(cx));
                this.inner = StartInner::Finished(None);
                Poll::Ready(match joined {
                    Ok(result) => result,
                    Err(error) if error.is_cancelled() => Err(ScenarioError::Aborted(
                        "establishing task cancelled by teardown".to_string(),
                    )),
                    Err(error) => Err(ScenarioError::EstablishFailed(format!(
                        "establishing task panicked: {error}"
                    ))),
                })
            }
            StartInner::Finished(result) => match result.take() {
                Some(result) => Poll::Ready(result),
                None => Poll::Pending,
            },
        }
    }
}

/// An induced condition with an establish / maintain / stop lifecycle
///
/// Clones are handles onto the same scenario.
#[derive(Clone)]
pub struct Scenario {
    shared: Arc<Shared>,
}

impl Scenario {
    /// Wrap `condition` in a fresh lifecycle in the `Starting` state
    pub fn new(name: impl Into<String>, condition: impl Condition) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                lifecycle: Mutex::new(Lifecycle {
                    state: ScenarioState::Starting,
                    started: false,
                    established: false,
                    collapsed: None,
                    establishing: None,
                    monitors: Vec::new(),
                }),
                establishment: EventChannel::new(),
                collapse: EventChannel::new(),
                condition: Box::new(condition),
                teardown: OnceLock::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> ScenarioState {
        self.shared.lifecycle().state
    }

    /// Begin establishing the condition on the current Tokio runtime
    ///
    /// The work runs in its own task; awaiting the returned handle is only
    /// needed to observe establishment errors.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> StartHandle {
        let mut lifecycle = self.shared.lifecycle();
        if lifecycle.state.is_stopping() {
            return StartHandle::finished(Err(ScenarioError::Stopped));
        }
        if lifecycle.started {
            return StartHandle::finished(Err(ScenarioError::AlreadyStarted));
        }
        lifecycle.started = true;

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let health = HealthMonitor {
                shared: Arc::downgrade(&shared),
            };
            let result = shared.condition.establish(health).await;
            match &result {
                Ok(()) => shared.mark_established(),
                Err(error) => {
                    warn!(scenario = %shared.name, %error, "Scenario establishment failed")
                }
            }
            result
        });
        lifecycle.establishing = Some(task.abort_handle());
        debug!(scenario = %self.shared.name, "Scenario starting");

        StartHandle {
            inner: StartInner::Running(task),
        }
    }

    /// Signal resolving once the condition is established
    ///
    /// Immediately ready if establishment already happened.
    pub fn established(&self) -> Establishment {
        let lifecycle = self.shared.lifecycle();
        if lifecycle.established {
            Establishment::ready()
        } else {
            Establishment::waiting(self.shared.establishment.subscribe())
        }
    }

    /// Signal resolving with the reason if the condition stops holding
    ///
    /// Immediately ready if the scenario already collapsed. Taking the signal
    /// of an established scenario moves it to `Maintaining`.
    pub fn maintained(&self) -> Collapse {
        let mut lifecycle = self.shared.lifecycle();
        if let Some(reason) = &lifecycle.collapsed {
            return Collapse::fired(reason.clone());
        }
        if lifecycle.state == ScenarioState::Established {
            self.shared
                .transition(&mut lifecycle, ScenarioState::Maintaining);
        }
        Collapse::waiting(self.shared.collapse.subscribe())
    }

    /// Tear the scenario down
    ///
    /// Monitoring tasks and any unfinished establishing work are cancelled
    /// before the condition's teardown runs. Teardown runs at most once in
    /// its own task, so it completes even if every caller is cancelled;
    /// every caller, concurrent or later, receives the same result.
    ///
    /// # Panics
    ///
    /// The first call panics if made outside a Tokio runtime.
    pub async fn stop(&self) -> ScenarioResult<()> {
        let mut outcome = self
            .shared
            .teardown
            .get_or_init(|| {
                let (sender, receiver) = watch::channel(None);
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    let result = shared.shut_down().await;
                    sender.send_replace(Some(result));
                });
                receiver
            })
            .clone();

        match outcome.wait_for(Option::is_some).await {
            Ok(result) => result.clone().unwrap_or(Ok(())),
            // The teardown task ended without publishing
            Err(_) => Err(ScenarioError::TeardownFailed(
                "teardown task panicked".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
