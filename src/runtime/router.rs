//! Run-to-completion routing of one event through the active configuration.

use super::error::MachineError;
use super::hierarchy::MachineCore;
use super::log::{describe, TransitionRecord};
use crate::core::{Event, Origin, Reaction, Signal, StateId, Tag};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// What happened to one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Dispatch<S: StateId> {
    /// `source` reacted with a transition that now has `target` active.
    Transitioned { source: S, target: S },
    /// `by` handled the event without a structural change.
    Consumed { by: S },
    /// No active state cared about the event.
    Dropped,
    /// The event came from a client that no longer exists or from a request
    /// the client has since superseded.
    Stale,
}

/// Transitions committed in the current cycle. At most one is allowed:
/// two behaviors of one state both transitioning on an event is fatal.
#[derive(Debug, Default)]
pub(crate) struct Cycle {
    committed: Option<String>,
}

impl Cycle {
    pub(crate) fn commit<S: StateId>(&mut self, source: &S, target: &S) -> Result<(), MachineError> {
        let label = format!("{} -> {}", source.name(), target.name());
        match self.committed.take() {
            Some(first) => Err(MachineError::DoubleTransition {
                first,
                second: label,
            }),
            None => {
                self.committed = Some(label);
                Ok(())
            }
        }
    }
}

impl<S: StateId, K: Signal> MachineCore<S, K> {
    /// Route `event`. Candidates are the active states innermost first;
    /// every behavior of a candidate reacts, then its transition table is
    /// consulted if none of them transitioned or consumed. The first
    /// candidate to transition or consume ends the cycle.
    pub(crate) fn dispatch(&mut self, event: &Event<K>) -> Result<Dispatch<S>, MachineError> {
        if let Some(origin) = event.origin() {
            if !self.admit(origin, event.kind().is_terminal()) {
                tracing::warn!(event = ?event.kind(), "discarding stale event");
                return Ok(Dispatch::Stale);
            }
        }

        for (state, unit, trigger) in self.observe(event.kind()) {
            tracing::info!(state = state.name(), unit = %unit, trigger = ?trigger, "logic unit fired");
            self.sender.post(Event::signal(trigger))?;
        }

        let mut cycle = Cycle::default();
        for candidate in self.post_order() {
            let mut chosen: Option<(S, Option<Tag>)> = None;
            let mut consumed = false;
            for reaction in self.react(&candidate, event)? {
                match reaction {
                    Reaction::Transition { target, tag } => {
                        cycle.commit(&candidate, &target)?;
                        chosen = Some((target, tag));
                    }
                    Reaction::Consume => consumed = true,
                    Reaction::Forward => {}
                }
            }

            if chosen.is_none() && !consumed {
                if let Some(rule) = self.definition.matching_rule(&candidate, event) {
                    cycle.commit(&candidate, &rule.target)?;
                    chosen = Some((rule.target.clone(), rule.tag.clone()));
                }
            }

            if let Some((target, tag)) = chosen {
                self.transition(&candidate, &target, event, tag)?;
                return Ok(Dispatch::Transitioned {
                    source: candidate,
                    target,
                });
            }
            if consumed {
                tracing::debug!(state = candidate.name(), event = ?event.kind(), "event consumed");
                return Ok(Dispatch::Consumed { by: candidate });
            }
        }

        tracing::debug!(event = ?event.kind(), "no active state handles event, dropping");
        Ok(Dispatch::Dropped)
    }

    /// Ask the client that posted an event whether it is still current.
    /// Events of clients that no longer exist are stale.
    fn admit(&mut self, origin: &Origin, terminal: bool) -> bool {
        self.regions
            .iter_mut()
            .flatten()
            .find_map(|node| node.registry.admit(origin, terminal))
            .unwrap_or(false)
    }

    fn transition(
        &mut self,
        source: &S,
        target: &S,
        event: &Event<K>,
        tag: Option<Tag>,
    ) -> Result<(), MachineError> {
        if !self.definition.contains(target) {
            return Err(MachineError::UnknownTarget {
                state: target.name().to_string(),
            });
        }

        let scope = self.definition.transition_scope(source, target);
        let trigger = describe(event.kind());
        tracing::info!(
            from = source.name(),
            to = target.name(),
            trigger = %trigger,
            "transition"
        );

        self.exit(&scope.exit)?;
        self.enter(&scope.enter, &scope.path, None)?;

        self.log.record(TransitionRecord {
            from: source.clone(),
            to: target.clone(),
            trigger,
            tag: tag.or_else(|| event.tag().cloned()),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
