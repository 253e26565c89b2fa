//! Bounded record of the transitions a machine has taken.

use crate::core::{EventKind, StateId, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::time::Duration;

/// Record of a single transition.
///
/// # Example
///
/// ```rust
/// use orthos::runtime::TransitionRecord;
/// use orthos::state_enum;
/// use chrono::Utc;
///
/// state_enum! {
///     enum Pattern {
///         Forward,
///         Return,
///     }
/// }
///
/// let record = TransitionRecord {
///     from: Pattern::Forward,
///     to: Pattern::Return,
///     trigger: "move_base@motion:Succeeded".to_string(),
///     tag: None,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, Pattern::Return);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: StateId> {
    /// The state that reacted to the event
    pub from: S,
    /// The transition target
    pub to: S,
    /// Human readable description of the triggering event
    pub trigger: String,
    pub tag: Option<Tag>,
    /// When the transition completed
    pub timestamp: DateTime<Utc>,
}

/// Most recent transitions, oldest first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionLog<S: StateId> {
    capacity: usize,
    records: VecDeque<TransitionRecord<S>>,
}

impl<S: StateId> TransitionLog<S> {
    /// A log keeping at most `capacity` records; 0 disables logging.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(64)),
        }
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord<S>) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord<S>> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord<S>> {
        self.records.back()
    }

    /// States traversed: the first source, then every target.
    pub fn path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.records.front() {
            path.push(&first.from);
        }
        path.extend(self.records.iter().map(|r| &r.to));
        path
    }

    /// Time between the oldest and newest retained record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Short description of an event kind, e.g. `move_base@motion:Aborted`.
pub(crate) fn describe<K: Debug>(kind: &EventKind<K>) -> String {
    match kind {
        EventKind::Signal(signal) => format!("{signal:?}"),
        EventKind::Action {
            client,
            region,
            outcome,
        } => format!("{client}@{region}:{outcome}"),
        EventKind::Feedback { client, region } => format!("{client}@{region}:Feedback"),
        EventKind::Timer { client, region } => format!("{client}@{region}:Timer"),
    }
}
