//! Logic units: several input events folded into one trigger signal.
//!
//! A logic unit belongs to a state. It watches every event admitted while
//! the state is active, whichever state ends up handling it, and posts its
//! trigger signal once its condition holds. The unit is rebuilt from its
//! declaration on every entry, so it fires at most once per activation.

use super::event::EventKind;
use super::state::Signal;
use serde::{Deserialize, Serialize};

/// How the inputs of a logic unit combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    /// Every input must have been seen at least once.
    All,
    /// The first input seen is enough.
    Any,
}

/// Aggregates input event kinds into one trigger signal.
///
/// # Example
///
/// ```rust
/// use orthos::core::{EventKind, LogicUnit};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Signal {
///     LidarUp,
///     CameraUp,
///     SensorsReady,
/// }
///
/// let mut unit = LogicUnit::all(
///     "sensors",
///     [EventKind::Signal(Signal::LidarUp), EventKind::Signal(Signal::CameraUp)],
///     Signal::SensorsReady,
/// );
///
/// assert_eq!(unit.observe(&EventKind::Signal(Signal::LidarUp)), None);
/// assert_eq!(
///     unit.observe(&EventKind::Signal(Signal::CameraUp)),
///     Some(Signal::SensorsReady)
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LogicUnit<K> {
    name: String,
    aggregation: Aggregation,
    inputs: Vec<EventKind<K>>,
    trigger: K,
    seen: Vec<bool>,
    fired: bool,
}

impl<K: Signal> LogicUnit<K> {
    pub fn new(
        name: impl Into<String>,
        aggregation: Aggregation,
        inputs: impl IntoIterator<Item = EventKind<K>>,
        trigger: K,
    ) -> Self {
        let inputs: Vec<EventKind<K>> = inputs.into_iter().collect();
        Self {
            name: name.into(),
            aggregation,
            seen: vec![false; inputs.len()],
            inputs,
            trigger,
            fired: false,
        }
    }

    /// Fires once every input has been seen.
    pub fn all(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = EventKind<K>>,
        trigger: K,
    ) -> Self {
        Self::new(name, Aggregation::All, inputs, trigger)
    }

    /// Fires on the first input seen.
    pub fn any(
        name: impl Into<String>,
        inputs: impl IntoIterator<Item = EventKind<K>>,
        trigger: K,
    ) -> Self {
        Self::new(name, Aggregation::Any, inputs, trigger)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn inputs(&self) -> &[EventKind<K>] {
        &self.inputs
    }

    pub fn trigger(&self) -> &K {
        &self.trigger
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Record an event of `kind`. Returns the trigger the first time the
    /// condition holds, `None` otherwise.
    pub fn observe(&mut self, kind: &EventKind<K>) -> Option<K> {
        if self.fired {
            return None;
        }

        let mut matched = false;
        for (input, seen) in self.inputs.iter().zip(self.seen.iter_mut()) {
            if input == kind {
                *seen = true;
                matched = true;
            }
        }
        if !matched {
            return None;
        }

        let satisfied = match self.aggregation {
            Aggregation::All => self.seen.iter().all(|seen| *seen),
            Aggregation::Any => true,
        };
        if satisfied {
            self.fired = true;
            return Some(self.trigger.clone());
        }
        None
    }
}
