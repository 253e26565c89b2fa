//! Validated, immutable description of a machine.
//!
//! Produced by [`MachineBuilder::build`](super::MachineBuilder::build) and
//! shared (behind an `Arc`) by every machine instance created from it.

use crate::core::{Event, EventKind, HistoryMode, LogicUnit, Signal, StateId, Tag};
use crate::registry::{Resource, ResourceScope};
use crate::runtime::StateBehavior;
use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the region enclosing the top-level states.
pub const ROOT_REGION: &str = "machine";

/// Position of a region in the machine definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionIndex(usize);

impl RegionIndex {
    /// The region enclosing the top-level states.
    pub const ROOT: RegionIndex = RegionIndex(0);

    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RegionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type BehaviorFactory<S, K> =
    Arc<dyn Fn() -> Box<dyn StateBehavior<S, K>> + Send + Sync>;

pub(crate) type ResourceFactory<K> =
    Arc<dyn Fn(&ResourceScope<K>) -> Box<dyn Resource> + Send + Sync>;

/// Resource installed when its region is constructed.
pub(crate) struct ResourceDecl<K: Signal> {
    pub(crate) name: Option<String>,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) factory: ResourceFactory<K>,
}

impl<K: Signal> ResourceDecl<K> {
    pub(crate) fn new<T, F>(name: Option<&str>, factory: F) -> Self
    where
        T: Resource,
        F: Fn(&ResourceScope<K>) -> T + Send + Sync + 'static,
    {
        Self {
            name: name.map(str::to_string),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            factory: Arc::new(move |scope| Box::new(factory(scope))),
        }
    }
}

/// One region: an exclusive slot holding exactly one active child while
/// its owner is active.
pub struct RegionDecl<S: StateId, K: Signal> {
    pub(crate) name: String,
    pub(crate) owner: Option<S>,
    pub(crate) initial: S,
    pub(crate) resources: Vec<ResourceDecl<K>>,
}

impl<S: StateId, K: Signal> RegionDecl<S, K> {
    /// Region tag, unique across the machine.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composite owning the region; `None` for the root region.
    pub fn owner(&self) -> Option<&S> {
        self.owner.as_ref()
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }
}

/// Declarative transition `(kind, source, target, tag)`.
///
/// The tag filters events that carry one (action outcomes) and labels the
/// transition otherwise: a rule tagged `TIMEOUT` on a timer kind fires on
/// every tick and records `TIMEOUT` in the transition log.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionRule<S, K> {
    pub kind: EventKind<K>,
    pub source: S,
    pub target: S,
    pub tag: Option<Tag>,
}

impl<S: StateId, K: Signal> TransitionRule<S, K> {
    /// Kind must be equal; a tagged event must carry the rule's tag.
    pub fn matches(&self, event: &Event<K>) -> bool {
        if &self.kind != event.kind() {
            return false;
        }
        match (&self.tag, event.tag()) {
            (Some(expected), Some(carried)) => expected == carried,
            _ => true,
        }
    }

    /// Two rules of one source are ambiguous when some event could match
    /// both. An untagged event of the shared kind matches any tag, so
    /// rules on one kind always overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// Behavior a state runs in one of its enclosing regions.
pub(crate) struct AttachedDecl<S: StateId, K: Signal> {
    pub(crate) region: RegionIndex,
    pub(crate) factory: BehaviorFactory<S, K>,
}

pub struct StateDecl<S: StateId, K: Signal> {
    pub(crate) id: S,
    pub(crate) parent: RegionIndex,
    pub(crate) regions: Vec<RegionIndex>,
    pub(crate) history: HistoryMode,
    pub(crate) rules: Vec<TransitionRule<S, K>>,
    pub(crate) behavior: Option<BehaviorFactory<S, K>>,
    pub(crate) attached: Vec<AttachedDecl<S, K>>,
    pub(crate) logic_units: Vec<LogicUnit<K>>,
}

impl<S: StateId, K: Signal> StateDecl<S, K> {
    pub fn id(&self) -> &S {
        &self.id
    }

    pub fn parent(&self) -> RegionIndex {
        self.parent
    }

    pub fn regions(&self) -> &[RegionIndex] {
        &self.regions
    }

    pub fn history(&self) -> HistoryMode {
        self.history
    }

    pub fn rules(&self) -> &[TransitionRule<S, K>] {
        &self.rules
    }

    pub fn is_composite(&self) -> bool {
        !self.regions.is_empty()
    }

    /// Regions the state's region behaviors run in, in declaration order.
    pub fn behavior_regions(&self) -> impl Iterator<Item = RegionIndex> + '_ {
        self.attached.iter().map(|a| a.region)
    }

    pub fn logic_units(&self) -> &[LogicUnit<K>] {
        &self.logic_units
    }
}

/// Where a transition exits and re-enters the hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionScope<S> {
    /// Outermost state left (with its whole active subtree).
    pub exit: S,
    /// Outermost state entered.
    pub enter: S,
    /// States below `enter` that must be entered on the way to the target.
    pub path: Vec<S>,
}

/// Immutable machine description.
pub struct MachineDefinition<S: StateId, K: Signal> {
    pub(crate) initial: S,
    pub(crate) states: HashMap<S, StateDecl<S, K>>,
    pub(crate) regions: Vec<RegionDecl<S, K>>,
}

impl<S: StateId, K: Signal> MachineDefinition<S, K> {
    /// Top-level state entered on start.
    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn state(&self, id: &S) -> Option<&StateDecl<S, K>> {
        self.states.get(id)
    }

    pub fn contains(&self, id: &S) -> bool {
        self.states.contains_key(id)
    }

    pub fn region(&self, index: RegionIndex) -> Option<&RegionDecl<S, K>> {
        self.regions.get(index.0)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn region_named(&self, name: &str) -> Option<RegionIndex> {
        self.regions
            .iter()
            .position(|r| r.name == name)
            .map(RegionIndex)
    }

    pub(crate) fn region_name(&self, index: RegionIndex) -> &str {
        self.regions
            .get(index.0)
            .map_or(ROOT_REGION, |r| r.name.as_str())
    }

    /// Region directly containing `id`.
    pub fn parent_region(&self, id: &S) -> Option<RegionIndex> {
        self.states.get(id).map(|d| d.parent)
    }

    /// Composite directly enclosing `id`, if any.
    pub fn parent_state(&self, id: &S) -> Option<&S> {
        let parent = self.parent_region(id)?;
        self.regions.get(parent.0)?.owner.as_ref()
    }

    /// States from the top level down to `id`, inclusive.
    pub fn ancestry(&self, id: &S) -> Vec<S> {
        let mut chain = vec![id.clone()];
        let mut current = id;
        while let Some(parent) = self.parent_state(current) {
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Regions visible from `id`: its own region first, up to the root.
    pub fn region_chain(&self, id: &S) -> Vec<RegionIndex> {
        self.ancestry(id)
            .iter()
            .rev()
            .filter_map(|s| self.parent_region(s))
            .collect()
    }

    /// First rule of `source` accepting `event`.
    pub fn matching_rule(&self, source: &S, event: &Event<K>) -> Option<&TransitionRule<S, K>> {
        self.states
            .get(source)?
            .rules
            .iter()
            .find(|rule| rule.matches(event))
    }

    /// Compute which subtree a transition from `source` to `target` leaves
    /// and which it enters.
    ///
    /// The exited and entered states are siblings in one region. A
    /// transition between different regions of one composite leaves and
    /// re-enters that composite; a transition to the source itself or to
    /// one of its ancestors or descendants re-enters the outer of the two.
    pub fn transition_scope(&self, source: &S, target: &S) -> TransitionScope<S> {
        let from = self.ancestry(source);
        let to = self.ancestry(target);

        let shared = from.len().min(to.len());
        let mut k = from
            .iter()
            .zip(&to)
            .take_while(|(a, b)| a == b)
            .count();
        if k == shared {
            k = shared.saturating_sub(1);
        } else if k > 0 && self.parent_region(&from[k]) != self.parent_region(&to[k]) {
            k -= 1;
        }

        TransitionScope {
            exit: from[k].clone(),
            enter: to[k].clone(),
            path: to[k + 1..].to_vec(),
        }
    }
}

impl<S: StateId, K: Signal> fmt::Debug for MachineDefinition<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDefinition")
            .field("initial", &self.initial)
            .field("states", &self.states.len())
            .field(
                "regions",
                &self.regions.iter().map(|r| &r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Mission,
        Drive,
        Turn,
        Watch,
        Alarm,
    }

    impl StateId for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Mission => "Mission",
                Self::Drive => "Drive",
                Self::Turn => "Turn",
                Self::Watch => "Watch",
                Self::Alarm => "Alarm",
            }
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Key {
        Go,
    }

    use TestState::*;

    fn definition() -> MachineDefinition<TestState, Key> {
        MachineBuilder::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle).on_signal(Key::Go, Mission))
            .state(
                StateBuilder::new(Mission)
                    .region("motion", Drive)
                    .region("safety", Watch),
            )
            .state(StateBuilder::new(Drive).within(Mission, "motion"))
            .state(StateBuilder::new(Turn).within(Mission, "motion"))
            .state(StateBuilder::new(Watch).within(Mission, "safety"))
            .state(StateBuilder::new(Alarm).within(Mission, "safety"))
            .build()
            .unwrap()
    }

    #[test]
    fn ancestry_runs_from_top_level_down() {
        let def = definition();
        assert_eq!(def.ancestry(&Turn), vec![Mission, Turn]);
        assert_eq!(def.ancestry(&Idle), vec![Idle]);
        assert_eq!(def.parent_state(&Watch), Some(&Mission));
        assert_eq!(def.parent_state(&Mission), None);
    }

    #[test]
    fn region_chain_walks_outwards() {
        let def = definition();
        let motion = def.region_named("motion").unwrap();
        assert_eq!(def.region_chain(&Drive), vec![motion, RegionIndex::ROOT]);
        assert_eq!(def.region_chain(&Idle), vec![RegionIndex::ROOT]);
    }

    #[test]
    fn sibling_transition_stays_in_region() {
        let def = definition();
        let scope = def.transition_scope(&Drive, &Turn);
        assert_eq!(scope.exit, Drive);
        assert_eq!(scope.enter, Turn);
        assert!(scope.path.is_empty());
    }

    #[test]
    fn cross_region_transition_reenters_composite() {
        let def = definition();
        let scope = def.transition_scope(&Drive, &Alarm);
        assert_eq!(scope.exit, Mission);
        assert_eq!(scope.enter, Mission);
        assert_eq!(scope.path, vec![Alarm]);
    }

    #[test]
    fn transition_into_nested_target_enters_along_path() {
        let def = definition();
        let scope = def.transition_scope(&Idle, &Turn);
        assert_eq!(scope.exit, Idle);
        assert_eq!(scope.enter, Mission);
        assert_eq!(scope.path, vec![Turn]);
    }

    #[test]
    fn self_transition_reenters_source() {
        let def = definition();
        let scope = def.transition_scope(&Drive, &Drive);
        assert_eq!(scope.exit, Drive);
        assert_eq!(scope.enter, Drive);

        let scope = def.transition_scope(&Mission, &Turn);
        assert_eq!(scope.exit, Mission);
        assert_eq!(scope.path, vec![Turn]);
    }

    #[test]
    fn untagged_rule_accepts_any_tag() {
        let rule = TransitionRule::<TestState, Key> {
            kind: EventKind::succeeded("move_base", "motion"),
            source: Drive,
            target: Turn,
            tag: None,
        };
        let event = Event::new(EventKind::succeeded("move_base", "motion")).with_tag(Tag::Success);
        assert!(rule.matches(&event));

        let tagged = TransitionRule {
            tag: Some(Tag::Abort),
            ..rule.clone()
        };
        assert!(!tagged.matches(&event));
        assert!(tagged.overlaps(&rule));
    }

    #[test]
    fn rule_tag_labels_events_without_one() {
        let rule = TransitionRule::<TestState, Key> {
            kind: EventKind::timer("watchdog", "motion"),
            source: Drive,
            target: Turn,
            tag: Some(Tag::named("TIMEOUT")),
        };

        assert!(rule.matches(&Event::new(EventKind::timer("watchdog", "motion"))));
        assert!(rule.matches(
            &Event::new(EventKind::timer("watchdog", "motion")).with_tag(Tag::named("TIMEOUT"))
        ));
        assert!(!rule.matches(
            &Event::new(EventKind::timer("watchdog", "motion")).with_tag(Tag::named("NEXT"))
        ));
        assert!(!rule.matches(&Event::new(EventKind::timer("heartbeat", "motion"))));
    }
}
