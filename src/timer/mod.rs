//! Timer client posting tick events into the machine.
//!
//! Timeouts are not a special mechanism of the router: a state that wants
//! one requires a [`TimerClient`], starts it, and declares a transition on
//! `EventKind::Timer { client, region }`. Each activation gets a fresh
//! request id, so ticks still queued from a previous activation are
//! discarded as stale once the timer is restarted or stopped.
//!
//! Activations run as tasks on the Tokio runtime the machine is driven
//! from, so [`TimerClient::start`] must be called inside one.

use crate::core::{ClientId, Event, EventKind, Origin, RequestId, Signal};
use crate::registry::{Resource, ResourceScope};
use crate::runtime::EventSender;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle as Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Shortest period a timer ticks at.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Whether a timer fires once or keeps firing until stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerMode {
    #[default]
    Once,
    Repeat,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("Timer '{timer}' can only be started inside a Tokio runtime")]
    NoRuntime { timer: String },
}

struct Activation {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Posts `EventKind::Timer { client, region }` after `period` has elapsed.
///
/// # Example
///
/// ```rust,no_run
/// use orthos::timer::{TimerClient, TimerMode};
/// use std::time::Duration;
/// # fn demo(scope: &orthos::registry::ResourceScope<()>) -> Result<(), orthos::timer::TimerError> {
/// let mut timer = TimerClient::new("watchdog", scope, Duration::from_secs(5), TimerMode::Once);
/// timer.start()?;
/// # Ok(())
/// # }
/// ```
pub struct TimerClient<K: Signal> {
    name: String,
    region: String,
    id: ClientId,
    sender: EventSender<K>,
    period: Duration,
    mode: TimerMode,
    current: Option<RequestId>,
    activation: Option<Activation>,
}

impl<K: Signal> TimerClient<K> {
    pub fn new(
        name: impl Into<String>,
        scope: &ResourceScope<K>,
        period: Duration,
        mode: TimerMode,
    ) -> Self {
        Self {
            name: name.into(),
            region: scope.region().to_string(),
            id: ClientId::new(),
            sender: scope.sender().clone(),
            period: period.max(MIN_PERIOD),
            mode,
            current: None,
            activation: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// Kind of the tick events this timer posts.
    pub fn tick_kind(&self) -> EventKind<K> {
        EventKind::timer(self.name.clone(), self.region.clone())
    }

    pub fn is_running(&self) -> bool {
        self.activation
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    /// Start (or restart) the timer. Ticks of earlier activations become stale.
    pub fn start(&mut self) -> Result<RequestId, TimerError> {
        let runtime = Runtime::try_current().map_err(|_| TimerError::NoRuntime {
            timer: self.name.clone(),
        })?;
        self.stop();

        let request = RequestId::new();
        let origin = Origin {
            client: self.id,
            request: Some(request),
        };
        let (stop, mut stopped) = oneshot::channel::<()>();
        let sender = self.sender.clone();
        let kind = self.tick_kind();
        let period = self.period;
        let mode = self.mode;

        let task = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let tick = Event::new(kind.clone()).with_origin(origin);
                        if sender.post(tick).is_err() || mode == TimerMode::Once {
                            break;
                        }
                    }
                    _ = &mut stopped => break,
                }
            }
        });

        tracing::debug!(timer = %self.name, %request, ?period, ?mode, "timer started");
        self.current = Some(request);
        self.activation = Some(Activation { stop, task });
        Ok(request)
    }

    /// Stop the timer. Ticks already queued are discarded when routed.
    pub fn stop(&mut self) {
        if let Some(activation) = self.activation.take() {
            if activation.stop.send(()).is_err() {
                activation.task.abort();
            }
            tracing::debug!(timer = %self.name, "timer stopped");
        }
        self.current = None;
    }
}

impl<K: Signal> Resource for TimerClient<K> {
    fn client_id(&self) -> Option<ClientId> {
        Some(self.id)
    }

    fn admit(&mut self, origin: &Origin, _terminal: bool) -> bool {
        self.current.is_some() && origin.request == self.current
    }
}

impl<K: Signal> Drop for TimerClient<K> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<K: Signal> std::fmt::Debug for TimerClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerClient")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("period", &self.period)
            .field("mode", &self.mode)
            .field("current", &self.current)
            .finish()
    }
}
