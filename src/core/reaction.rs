//! Outcome of offering an event to one active state.

use super::event::Tag;
use super::state::StateId;

/// What a state does with an event offered to it.
#[derive(Clone, Debug, PartialEq)]
pub enum Reaction<S: StateId> {
    /// Leave for `target`; stops propagation.
    Transition { target: S, tag: Option<Tag> },
    /// Handled without a structural change; stops propagation.
    Consume,
    /// Not relevant here; the router tries the next candidate.
    Forward,
}

impl<S: StateId> Reaction<S> {
    pub fn transition(target: S) -> Self {
        Reaction::Transition { target, tag: None }
    }

    pub fn transition_tagged(target: S, tag: Tag) -> Self {
        Reaction::Transition {
            target,
            tag: Some(tag),
        }
    }

    pub fn stops_propagation(&self) -> bool {
        !matches!(self, Reaction::Forward)
    }
}
