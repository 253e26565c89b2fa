//! Builder for declaring one state.

use crate::builder::definition::{BehaviorFactory, ResourceDecl, TransitionRule};
use crate::core::{EventKind, HistoryMode, LogicUnit, Signal, StateId, Tag};
use crate::registry::{Resource, ResourceScope};
use crate::runtime::StateBehavior;
use std::sync::Arc;

pub(crate) struct RegionSpec<S, K: Signal> {
    pub(crate) name: String,
    pub(crate) initial: S,
    pub(crate) resources: Vec<ResourceDecl<K>>,
}

/// Builder declaring a state's place in the hierarchy, its regions, its
/// transition table and its behaviors.
///
/// # Example
///
/// ```rust
/// use orthos::builder::StateBuilder;
/// use orthos::core::{EventKind, HistoryMode, Tag};
/// use orthos::state_enum;
///
/// state_enum! {
///     enum Mission {
///         Navigate,
///         Drive,
///         Recover,
///     }
/// }
///
/// let navigate: StateBuilder<Mission, ()> = StateBuilder::new(Mission::Navigate)
///     .region("motion", Mission::Drive)
///     .history(HistoryMode::Shallow)
///     .on_tagged(
///         EventKind::aborted("move_base", "motion"),
///         Mission::Recover,
///         Tag::Abort,
///     );
/// ```
pub struct StateBuilder<S: StateId, K: Signal> {
    pub(crate) id: S,
    pub(crate) within: Option<(S, String)>,
    pub(crate) regions: Vec<RegionSpec<S, K>>,
    pub(crate) orphan_resources: Vec<String>,
    pub(crate) history: HistoryMode,
    pub(crate) rules: Vec<TransitionRule<S, K>>,
    pub(crate) behavior: Option<BehaviorFactory<S, K>>,
    pub(crate) attached: Vec<(String, BehaviorFactory<S, K>)>,
    pub(crate) logic_units: Vec<LogicUnit<K>>,
}

impl<S: StateId, K: Signal> StateBuilder<S, K> {
    pub fn new(id: S) -> Self {
        Self {
            id,
            within: None,
            regions: Vec::new(),
            orphan_resources: Vec::new(),
            history: HistoryMode::None,
            rules: Vec::new(),
            behavior: None,
            attached: Vec::new(),
            logic_units: Vec::new(),
        }
    }

    /// Place the state in region `region` of composite `parent`.
    /// States without a parent are top-level.
    pub fn within(mut self, parent: S, region: impl Into<String>) -> Self {
        self.within = Some((parent, region.into()));
        self
    }

    /// Declare a child region and the state it starts in. Regions are
    /// constructed in declaration order and destroyed in reverse.
    pub fn region(mut self, name: impl Into<String>, initial: S) -> Self {
        self.regions.push(RegionSpec {
            name: name.into(),
            initial,
            resources: Vec::new(),
        });
        self
    }

    /// Install a resource in `region` whenever the region is constructed.
    /// The resource lives exactly as long as the region.
    pub fn region_resource<T, F>(mut self, region: &str, name: Option<&str>, factory: F) -> Self
    where
        T: Resource,
        F: Fn(&ResourceScope<K>) -> T + Send + Sync + 'static,
    {
        match self.regions.iter_mut().find(|r| r.name == region) {
            Some(spec) => spec.resources.push(ResourceDecl::new(name, factory)),
            None => self.orphan_resources.push(region.to_string()),
        }
        self
    }

    pub fn history(mut self, mode: HistoryMode) -> Self {
        self.history = mode;
        self
    }

    /// Transition to `target` on any event of `kind`.
    pub fn on(mut self, kind: EventKind<K>, target: S) -> Self {
        self.rules.push(TransitionRule {
            kind,
            source: self.id.clone(),
            target,
            tag: None,
        });
        self
    }

    /// Transition to `target` on events of `kind` carrying `tag`.
    pub fn on_tagged(mut self, kind: EventKind<K>, target: S, tag: Tag) -> Self {
        self.rules.push(TransitionRule {
            kind,
            source: self.id.clone(),
            target,
            tag: Some(tag),
        });
        self
    }

    /// Shorthand for `on(EventKind::Signal(signal), target)`.
    pub fn on_signal(self, signal: K, target: S) -> Self {
        self.on(EventKind::Signal(signal), target)
    }

    /// Behavior constructed each time the state is entered.
    pub fn behavior<B, F>(mut self, factory: F) -> Self
    where
        B: StateBehavior<S, K> + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        self.behavior = Some(Arc::new(move || Box::new(factory())));
        self
    }

    /// Attach an extra behavior working on behalf of this state in
    /// `region`, which must be the state's own region or one enclosing it.
    ///
    /// It lives exactly as long as the state: constructed on entry, its
    /// hooks run after the state's own on entry and before them on exit.
    /// It sees every event offered to the state, and resources it requires
    /// are registered in `region` and released when the state exits.
    pub fn region_behavior<B, F>(mut self, region: impl Into<String>, factory: F) -> Self
    where
        B: StateBehavior<S, K> + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let factory: BehaviorFactory<S, K> = Arc::new(move || Box::new(factory()));
        self.attached.push((region.into(), factory));
        self
    }

    /// Aggregate events into a trigger signal while the state is active.
    pub fn logic_unit(mut self, unit: LogicUnit<K>) -> Self {
        self.logic_units.push(unit);
        self
    }
}
