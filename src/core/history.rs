//! History records for composite states.
//!
//! On exit, a history-enabled composite leaves behind the configuration it
//! had; the next entry restores it instead of the declared initial states.

use super::state::StateId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How much of a composite's configuration survives its exit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryMode {
    #[default]
    None,
    /// Remember the active direct child of each region.
    Shallow,
    /// Remember every active descendant.
    Deep,
}

/// Configuration remembered for one composite state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum HistoryRecord<S: StateId> {
    /// Active direct child of each region, in region declaration order.
    Shallow(Vec<S>),
    /// All active descendants, outermost first.
    Deep(Vec<S>),
}

impl<S: StateId> HistoryRecord<S> {
    pub fn states(&self) -> &[S] {
        match self {
            HistoryRecord::Shallow(states) | HistoryRecord::Deep(states) => states,
        }
    }

    pub fn contains(&self, state: &S) -> bool {
        self.states().contains(state)
    }
}

/// Last recorded configuration per composite state.
///
/// # Example
///
/// ```rust
/// use orthos::core::{HistoryRecord, HistoryTracker, StateId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Pattern { Radial, Rotate, Forward }
///
/// impl StateId for Pattern {
///     fn name(&self) -> &str {
///         match self {
///             Self::Radial => "Radial",
///             Self::Rotate => "Rotate",
///             Self::Forward => "Forward",
///         }
///     }
/// }
///
/// let mut tracker = HistoryTracker::new();
/// assert!(tracker.retrieve(&Pattern::Radial).is_none());
///
/// tracker.record(Pattern::Radial, HistoryRecord::Shallow(vec![Pattern::Forward]));
/// assert!(tracker.retrieve(&Pattern::Radial).unwrap().contains(&Pattern::Forward));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct HistoryTracker<S: StateId> {
    records: HashMap<S, HistoryRecord<S>>,
}

impl<S: StateId> Default for HistoryTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId> HistoryTracker<S> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Replace the record kept for `owner`.
    pub fn record(&mut self, owner: S, record: HistoryRecord<S>) {
        self.records.insert(owner, record);
    }

    pub fn retrieve(&self, owner: &S) -> Option<&HistoryRecord<S>> {
        self.records.get(owner)
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
