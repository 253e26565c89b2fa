//! A running instance of a machine definition.

use super::config::MachineConfig;
use super::error::MachineError;
use super::hierarchy::MachineCore;
use super::log::TransitionLog;
use super::queue::{event_channel, EventReceiver, EventSender, QueueClosed, QueueItem};
use super::router::Dispatch;
use super::snapshot::{ConfigurationSnapshot, RegionSnapshot, SNAPSHOT_VERSION};
use crate::builder::{MachineDefinition, RegionIndex};
use crate::core::{Event, GlobalData, HistoryTracker, Signal, StateId};
use crate::registry::Resource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a machine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineStatus {
    /// Created, not yet started.
    Idle,
    /// Processing events.
    Running,
    /// A fatal error occurred; no further events are processed.
    Faulted,
    /// Shut down.
    Terminated,
}

/// One instance of a [`MachineDefinition`].
///
/// All events are processed on the thread driving the machine (through
/// [`step`](Self::step), [`process_pending`](Self::process_pending) or
/// [`run`](Self::run)); other threads only post through an
/// [`EventSender`].
///
/// # Example
///
/// ```rust
/// use orthos::builder::{MachineBuilder, StateBuilder};
/// use orthos::runtime::{Dispatch, Machine, MachineConfig};
/// use orthos::state_enum;
/// use std::sync::Arc;
///
/// state_enum! {
///     enum Door {
///         Closed,
///         Open,
///     }
/// }
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Signal {
///     Push,
/// }
///
/// let definition = MachineBuilder::new()
///     .initial(Door::Closed)
///     .state(StateBuilder::new(Door::Closed).on_signal(Signal::Push, Door::Open))
///     .state(StateBuilder::new(Door::Open).on_signal(Signal::Push, Door::Closed))
///     .build()
///     .unwrap();
///
/// let mut machine = Machine::new(Arc::new(definition), MachineConfig::default());
/// machine.start().unwrap();
/// machine.signal(Signal::Push).unwrap();
///
/// let dispatch = machine.step().unwrap();
/// assert_eq!(
///     dispatch,
///     Some(Dispatch::Transitioned { source: Door::Closed, target: Door::Open })
/// );
/// assert!(machine.is_active(&Door::Open));
/// ```
pub struct Machine<S: StateId, K: Signal> {
    id: Uuid,
    status: MachineStatus,
    core: MachineCore<S, K>,
    receiver: EventReceiver<K>,
}

impl<S: StateId, K: Signal> Machine<S, K> {
    pub fn new(definition: Arc<MachineDefinition<S, K>>, config: MachineConfig) -> Self {
        let (sender, receiver) = event_channel();
        Self {
            id: Uuid::new_v4(),
            status: MachineStatus::Idle,
            core: MachineCore::new(definition, config, sender),
            receiver,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn definition(&self) -> &Arc<MachineDefinition<S, K>> {
        &self.core.definition
    }

    pub fn config(&self) -> &MachineConfig {
        &self.core.config
    }

    /// Build the initial configuration: the root region with its declared
    /// resources, then the initial state and its subtree.
    pub fn start(&mut self) -> Result<(), MachineError> {
        match self.status {
            MachineStatus::Idle => {}
            MachineStatus::Running => return Err(MachineError::AlreadyStarted),
            status => return Err(MachineError::Halted { status }),
        }

        tracing::info!(machine = %self.id, initial = self.core.definition.initial().name(), "starting machine");
        self.status = MachineStatus::Running;
        let initial = self.core.definition.initial().clone();
        let result = self
            .core
            .open_region(RegionIndex::ROOT)
            .and_then(|_| self.core.enter(&initial, &[], None));
        self.guard(result)
    }

    /// Sender for posting events from other threads.
    pub fn sender(&self) -> EventSender<K> {
        self.core.sender.clone()
    }

    pub fn post(&self, event: Event<K>) -> Result<(), QueueClosed> {
        self.core.sender.post(event)
    }

    pub fn signal(&self, signal: K) -> Result<(), QueueClosed> {
        self.core.sender.signal(signal)
    }

    /// Process the next queued event, if any. A queued stop request shuts
    /// the machine down.
    pub fn step(&mut self) -> Result<Option<Dispatch<S>>, MachineError> {
        self.ensure_running()?;
        match self.receiver.try_recv() {
            None => Ok(None),
            Some(QueueItem::Stop) => {
                self.shutdown()?;
                Ok(None)
            }
            Some(QueueItem::Event(event)) => self.process(event).map(Some),
        }
    }

    /// Process events until the queue is empty, including events posted
    /// while processing.
    pub fn process_pending(&mut self) -> Result<Vec<Dispatch<S>>, MachineError> {
        let mut dispatched = Vec::new();
        while self.status == MachineStatus::Running {
            match self.step()? {
                Some(dispatch) => dispatched.push(dispatch),
                None => break,
            }
        }
        Ok(dispatched)
    }

    /// Process events as they arrive until a stop request is received
    /// through [`EventSender::stop`].
    pub async fn run(&mut self) -> Result<(), MachineError> {
        self.ensure_running()?;
        while let Some(item) = self.receiver.recv().await {
            match item {
                QueueItem::Event(event) => {
                    self.process(event)?;
                }
                QueueItem::Stop => break,
            }
        }
        self.shutdown()
    }

    /// Exit the whole configuration (running exit hooks), release every
    /// resource and clear the global data store.
    pub fn shutdown(&mut self) -> Result<(), MachineError> {
        let result = match self.status {
            MachineStatus::Running => self.core.exit_all(),
            MachineStatus::Faulted => {
                self.core.teardown();
                Ok(())
            }
            MachineStatus::Idle | MachineStatus::Terminated => Ok(()),
        };
        if result.is_err() {
            self.core.teardown();
        }
        self.core.globals.clear();
        self.status = MachineStatus::Terminated;
        tracing::info!(machine = %self.id, "machine shut down");
        result
    }

    /// Active states, outermost first, regions in declaration order.
    pub fn active_states(&self) -> Vec<S> {
        self.core.pre_order()
    }

    /// Active child of the region named `region`, if the region is live.
    pub fn active_in(&self, region: &str) -> Option<&S> {
        let index = self.core.definition.region_named(region)?;
        self.core.active_child(index)
    }

    pub fn is_active(&self, state: &S) -> bool {
        self.core.is_active(state)
    }

    pub fn global_data(&self) -> &GlobalData {
        &self.core.globals
    }

    pub fn global_data_mut(&mut self) -> &mut GlobalData {
        &mut self.core.globals
    }

    pub fn history(&self) -> &HistoryTracker<S> {
        &self.core.history
    }

    pub fn transition_log(&self) -> &TransitionLog<S> {
        &self.core.log
    }

    /// Look at a resource of a live region from outside the machine.
    pub fn resource<T: Resource>(&self, region: &str, name: Option<&str>) -> Option<&T> {
        let index = self.core.definition.region_named(region)?;
        let registry = &self.core.node(index)?.registry;
        registry.get::<T>(registry.find::<T>(name)?).ok()
    }

    pub fn snapshot(&self) -> ConfigurationSnapshot<S> {
        let definition = &self.core.definition;
        let regions = (0..definition.region_count())
            .map(RegionIndex::new)
            .filter_map(|index| {
                let node = self.core.node(index)?;
                let decl = definition.region(index)?;
                Some(RegionSnapshot {
                    region: decl.name().to_string(),
                    owner: decl.owner().cloned(),
                    active: node.active.clone(),
                    resources: node.registry.describe(),
                })
            })
            .collect();

        ConfigurationSnapshot {
            version: SNAPSHOT_VERSION,
            machine: self.id,
            taken_at: Utc::now(),
            status: self.status,
            regions,
            globals: self.core.globals.names(),
        }
    }

    fn process(&mut self, event: Event<K>) -> Result<Dispatch<S>, MachineError> {
        let result = self.core.dispatch(&event);
        drop(event);
        self.guard(result)
    }

    fn ensure_running(&self) -> Result<(), MachineError> {
        match self.status {
            MachineStatus::Running => Ok(()),
            MachineStatus::Idle => Err(MachineError::NotStarted),
            status => Err(MachineError::Halted { status }),
        }
    }

    fn guard<T>(&mut self, result: Result<T, MachineError>) -> Result<T, MachineError> {
        if let Err(err) = &result {
            if err.is_fatal() {
                tracing::error!(machine = %self.id, error = %err, "machine faulted");
                self.status = MachineStatus::Faulted;
            }
        }
        result
    }
}

impl<S: StateId, K: Signal> std::fmt::Debug for Machine<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("active", &self.core.pre_order())
            .finish()
    }
}

impl<S: StateId, K: Signal> Drop for Machine<S, K> {
    fn drop(&mut self) {
        // Dropping every region's clients cancels their in-flight goals.
        self.core.teardown();
    }
}
