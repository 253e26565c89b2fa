//! Builder for constructing machine definitions.

use crate::builder::definition::{
    AttachedDecl, BehaviorFactory, MachineDefinition, RegionDecl, RegionIndex, ResourceDecl,
    StateDecl, ROOT_REGION,
};
use crate::builder::error::{BuildError, DefinitionError};
use crate::builder::state::StateBuilder;
use crate::core::{Signal, StateId};
use crate::registry::{Resource, ResourceScope};
use std::collections::HashMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

fn check(ok: bool, error: impl FnOnce() -> DefinitionError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Builder for constructing machine definitions with a fluent API.
///
/// `build` validates the whole definition and reports every problem it
/// finds at once.
///
/// # Example
///
/// ```rust
/// use orthos::builder::{MachineBuilder, StateBuilder};
/// use orthos::state_enum;
///
/// state_enum! {
///     enum Robot {
///         Idle,
///         Working,
///         Driving,
///         Scanning,
///     }
/// }
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Signal {
///     Start,
///     Stop,
/// }
///
/// let definition = MachineBuilder::new()
///     .initial(Robot::Idle)
///     .state(StateBuilder::new(Robot::Idle).on_signal(Signal::Start, Robot::Working))
///     .state(
///         StateBuilder::new(Robot::Working)
///             .region("base", Robot::Driving)
///             .region("sensors", Robot::Scanning)
///             .on_signal(Signal::Stop, Robot::Idle),
///     )
///     .state(StateBuilder::new(Robot::Driving).within(Robot::Working, "base"))
///     .state(StateBuilder::new(Robot::Scanning).within(Robot::Working, "sensors"))
///     .build()
///     .unwrap();
///
/// assert_eq!(definition.ancestry(&Robot::Scanning), vec![Robot::Working, Robot::Scanning]);
/// ```
pub struct MachineBuilder<S: StateId, K: Signal> {
    initial: Option<S>,
    states: Vec<StateBuilder<S, K>>,
    resources: Vec<ResourceDecl<K>>,
}

impl<S: StateId, K: Signal> MachineBuilder<S, K> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Set the top-level state entered on start (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Declare a state.
    pub fn state(mut self, state: StateBuilder<S, K>) -> Self {
        self.states.push(state);
        self
    }

    /// Declare a resource of the root region, installed on start and kept
    /// until shutdown.
    pub fn resource<T, F>(mut self, name: Option<&str>, factory: F) -> Self
    where
        T: Resource,
        F: Fn(&ResourceScope<K>) -> T + Send + Sync + 'static,
    {
        self.resources.push(ResourceDecl::new(name, factory));
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<MachineDefinition<S, K>, BuildError> {
        let mut checks: Vec<Check> = Vec::new();
        let mut states: HashMap<S, StateDecl<S, K>> = HashMap::new();
        let mut regions: Vec<RegionDecl<S, K>> = Vec::new();
        let mut placements: Vec<(S, Option<(S, String)>)> = Vec::new();
        let mut attachments: Vec<(S, Vec<(String, BehaviorFactory<S, K>)>)> = Vec::new();

        checks.push(check(self.initial.is_some(), || {
            DefinitionError::MissingInitialState
        }));

        for builder in self.states {
            let name = builder.id.name().to_string();
            if states.contains_key(&builder.id) {
                checks.push(Validation::fail(DefinitionError::DuplicateState {
                    state: name,
                }));
                continue;
            }

            for region in builder.orphan_resources {
                checks.push(Validation::fail(DefinitionError::ResourceOutsideRegion {
                    state: name.clone(),
                    region,
                }));
            }

            let mut owned = Vec::new();
            for spec in builder.regions {
                if spec.name == ROOT_REGION {
                    checks.push(Validation::fail(DefinitionError::ReservedRegion {
                        state: name.clone(),
                    }));
                    continue;
                }
                if regions.iter().any(|r| r.name == spec.name) {
                    checks.push(Validation::fail(DefinitionError::DuplicateRegion {
                        region: spec.name,
                    }));
                    continue;
                }
                // Index 0 is the root region, prepended below.
                owned.push(RegionIndex::new(regions.len() + 1));
                regions.push(RegionDecl {
                    name: spec.name,
                    owner: Some(builder.id.clone()),
                    initial: spec.initial,
                    resources: spec.resources,
                });
            }

            for (i, rule) in builder.rules.iter().enumerate() {
                let ambiguous = builder.rules[..i].iter().any(|other| other.overlaps(rule));
                checks.push(check(!ambiguous, || DefinitionError::AmbiguousTransition {
                    state: name.clone(),
                    event: format!("{:?}", rule.kind),
                }));
            }

            for unit in &builder.logic_units {
                checks.push(check(!unit.inputs().is_empty(), || {
                    DefinitionError::EmptyLogicUnit {
                        state: name.clone(),
                        unit: unit.name().to_string(),
                    }
                }));
            }

            placements.push((builder.id.clone(), builder.within));
            attachments.push((builder.id.clone(), builder.attached));
            states.insert(
                builder.id.clone(),
                StateDecl {
                    id: builder.id,
                    parent: RegionIndex::ROOT,
                    regions: owned,
                    history: builder.history,
                    rules: builder.rules,
                    behavior: builder.behavior,
                    attached: Vec::new(),
                    logic_units: builder.logic_units,
                },
            );
        }

        let Some(initial) = self.initial else {
            return Err(collect(checks));
        };
        regions.insert(
            0,
            RegionDecl {
                name: ROOT_REGION.to_string(),
                owner: None,
                initial: initial.clone(),
                resources: self.resources,
            },
        );

        for (id, within) in placements {
            let Some((parent, region)) = within else {
                continue;
            };
            if !states.contains_key(&parent) {
                checks.push(Validation::fail(DefinitionError::UnknownState {
                    state: parent.name().to_string(),
                }));
                continue;
            }
            let index = regions
                .iter()
                .position(|r| r.name == region && r.owner.as_ref() == Some(&parent));
            match (index, states.get_mut(&id)) {
                (Some(index), Some(decl)) => decl.parent = RegionIndex::new(index),
                _ => checks.push(Validation::fail(DefinitionError::UnknownRegion {
                    state: id.name().to_string(),
                    parent: parent.name().to_string(),
                    region,
                })),
            }
        }

        for (id, attached) in attachments {
            let enclosing = enclosing_regions(&id, &states, &regions);
            for (region, factory) in attached {
                let index = regions
                    .iter()
                    .position(|r| r.name == region)
                    .filter(|index| enclosing.contains(index));
                match (index, states.get_mut(&id)) {
                    (Some(index), Some(decl)) => decl.attached.push(AttachedDecl {
                        region: RegionIndex::new(index),
                        factory,
                    }),
                    _ => checks.push(Validation::fail(DefinitionError::BehaviorOutsideRegion {
                        state: id.name().to_string(),
                        region,
                    })),
                }
            }
        }

        for decl in states.values() {
            for rule in &decl.rules {
                checks.push(check(states.contains_key(&rule.target), || {
                    DefinitionError::UnknownState {
                        state: rule.target.name().to_string(),
                    }
                }));
            }
        }

        for (index, region) in regions.iter().enumerate() {
            match states.get(&region.initial) {
                None => checks.push(Validation::fail(DefinitionError::UnknownState {
                    state: region.initial.name().to_string(),
                })),
                Some(decl) if index == 0 => {
                    checks.push(check(decl.parent == RegionIndex::ROOT, || {
                        DefinitionError::TopLevelInitial {
                            state: region.initial.name().to_string(),
                        }
                    }))
                }
                Some(decl) => checks.push(check(decl.parent.index() == index, || {
                    DefinitionError::InitialNotInRegion {
                        region: region.name.clone(),
                        state: region.initial.name().to_string(),
                    }
                })),
            }
        }

        for id in states.keys() {
            checks.push(check(!is_own_ancestor(id, &states, &regions), || {
                DefinitionError::CyclicHierarchy {
                    state: id.name().to_string(),
                }
            }));
        }

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(MachineDefinition {
                initial,
                states,
                regions,
            }),
            Validation::Failure(errors) => Err(BuildError::Invalid(errors.iter().cloned().collect())),
        }
    }
}

impl<S: StateId, K: Signal> Default for MachineBuilder<S, K> {
    fn default() -> Self {
        Self::new()
    }
}

fn collect(checks: Vec<Check>) -> BuildError {
    match Validation::all_vec(checks) {
        Validation::Failure(errors) => BuildError::Invalid(errors.iter().cloned().collect()),
        Validation::Success(_) => BuildError::Invalid(vec![DefinitionError::MissingInitialState]),
    }
}

/// Indices of the regions enclosing `id`, innermost first. Stops early on
/// a cyclic hierarchy, which is reported separately.
fn enclosing_regions<S: StateId, K: Signal>(
    id: &S,
    states: &HashMap<S, StateDecl<S, K>>,
    regions: &[RegionDecl<S, K>],
) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut current = states.get(id);
    while let Some(decl) = current {
        let index = decl.parent.index();
        if chain.contains(&index) {
            break;
        }
        chain.push(index);
        current = regions
            .get(index)
            .and_then(|region| region.owner.as_ref())
            .and_then(|owner| states.get(owner));
    }
    chain
}

fn is_own_ancestor<S: StateId, K: Signal>(
    id: &S,
    states: &HashMap<S, StateDecl<S, K>>,
    regions: &[RegionDecl<S, K>],
) -> bool {
    let mut current = id;
    for _ in 0..=states.len() {
        let owner = states
            .get(current)
            .and_then(|decl| regions.get(decl.parent.index()))
            .and_then(|region| region.owner.as_ref());
        match owner {
            None => return false,
            Some(parent) if parent == id => return true,
            Some(parent) => current = parent,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventKind, LogicUnit, Tag};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Idle,
        Mission,
        Drive,
        Turn,
        Watch,
    }

    impl StateId for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Idle => "Idle",
                Self::Mission => "Mission",
                Self::Drive => "Drive",
                Self::Turn => "Turn",
                Self::Watch => "Watch",
            }
        }
    }

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Key {
        Go,
        Halt,
    }

    use TestState::*;

    fn errors(result: Result<MachineDefinition<TestState, Key>, BuildError>) -> Vec<DefinitionError> {
        match result {
            Err(BuildError::Invalid(errors)) => errors,
            Ok(_) => panic!("definition unexpectedly valid"),
        }
    }

    #[test]
    fn builder_validates_required_fields() {
        let result = MachineBuilder::<TestState, Key>::new()
            .state(StateBuilder::new(Idle))
            .build();

        assert_eq!(errors(result), vec![DefinitionError::MissingInitialState]);
    }

    #[test]
    fn fluent_api_builds_definition() {
        let definition = MachineBuilder::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle).on_signal(Key::Go, Mission))
            .state(
                StateBuilder::new(Mission)
                    .region("motion", Drive)
                    .on_signal(Key::Halt, Idle),
            )
            .state(StateBuilder::new(Drive).within(Mission, "motion"))
            .build()
            .unwrap();

        assert_eq!(definition.initial(), &Idle);
        assert_eq!(definition.region_count(), 2);
        assert_eq!(definition.region_named(ROOT_REGION), Some(RegionIndex::ROOT));
        assert_eq!(
            definition.parent_region(&Drive),
            definition.region_named("motion")
        );
    }

    #[test]
    fn build_accumulates_all_errors() {
        let result = MachineBuilder::new()
            .initial(Drive)
            .state(StateBuilder::new(Idle).on_signal(Key::Go, Turn))
            .state(StateBuilder::new(Idle))
            .state(StateBuilder::new(Mission).region("motion", Watch))
            .state(StateBuilder::new(Drive).within(Mission, "motion"))
            .state(StateBuilder::new(Watch))
            .build();

        let errors = errors(result);
        assert!(errors.contains(&DefinitionError::DuplicateState {
            state: "Idle".into()
        }));
        assert!(errors.contains(&DefinitionError::UnknownState {
            state: "Turn".into()
        }));
        assert!(errors.contains(&DefinitionError::InitialNotInRegion {
            region: "motion".into(),
            state: "Watch".into()
        }));
        assert!(errors.contains(&DefinitionError::TopLevelInitial {
            state: "Drive".into()
        }));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn overlapping_rules_are_ambiguous() {
        let result = MachineBuilder::new()
            .initial(Idle)
            .state(
                StateBuilder::new(Idle)
                    .on(EventKind::aborted("move_base", "machine"), Mission)
                    .on_tagged(EventKind::aborted("move_base", "machine"), Turn, Tag::Abort),
            )
            .state(StateBuilder::new(Mission))
            .state(StateBuilder::new(Turn))
            .build();

        assert!(matches!(
            errors(result).as_slice(),
            [DefinitionError::AmbiguousTransition { state, .. }] if state == "Idle"
        ));
    }

    #[test]
    fn distinct_tags_on_one_kind_are_ambiguous() {
        // Ticks carry no tag, so both rules would accept every tick.
        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(
                StateBuilder::new(Idle)
                    .on_tagged(EventKind::timer("t", "machine"), Mission, Tag::named("A"))
                    .on_tagged(EventKind::timer("t", "machine"), Turn, Tag::named("B"))
                    .on_tagged(EventKind::timer("u", "machine"), Turn, Tag::named("B")),
            )
            .state(StateBuilder::new(Mission))
            .state(StateBuilder::new(Turn))
            .build();

        assert!(matches!(
            errors(result).as_slice(),
            [DefinitionError::AmbiguousTransition { state, .. }] if state == "Idle"
        ));
    }

    #[test]
    fn region_names_are_checked() {
        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle).region("machine", Drive))
            .state(StateBuilder::new(Mission).region("motion", Turn))
            .state(StateBuilder::new(Watch).region("motion", Turn))
            .state(StateBuilder::new(Drive).within(Idle, "machine"))
            .state(StateBuilder::new(Turn).within(Mission, "motion"))
            .build();

        let errors = errors(result);
        assert!(errors.contains(&DefinitionError::ReservedRegion {
            state: "Idle".into()
        }));
        assert!(errors.contains(&DefinitionError::DuplicateRegion {
            region: "motion".into()
        }));
        assert!(errors.contains(&DefinitionError::UnknownRegion {
            state: "Drive".into(),
            parent: "Idle".into(),
            region: "machine".into()
        }));
    }

    #[test]
    fn cyclic_parents_are_rejected() {
        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle))
            .state(
                StateBuilder::new(Mission)
                    .region("outer", Drive)
                    .within(Drive, "inner"),
            )
            .state(
                StateBuilder::new(Drive)
                    .region("inner", Mission)
                    .within(Mission, "outer"),
            )
            .build();

        let errors = errors(result);
        assert!(errors.contains(&DefinitionError::CyclicHierarchy {
            state: "Mission".into()
        }));
        assert!(errors.contains(&DefinitionError::CyclicHierarchy {
            state: "Drive".into()
        }));
    }

    #[test]
    fn region_behaviors_must_target_an_enclosing_region() {
        let definition = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle))
            .state(
                StateBuilder::new(Mission)
                    .region("motion", Drive)
                    .region("safety", Watch),
            )
            .state(
                StateBuilder::new(Drive)
                    .within(Mission, "motion")
                    .region_behavior("motion", || crate::runtime::Passive)
                    .region_behavior(ROOT_REGION, || crate::runtime::Passive),
            )
            .state(StateBuilder::new(Watch).within(Mission, "safety"))
            .build()
            .unwrap();

        let motion = definition.region_named("motion").unwrap();
        let drive = definition.state(&Drive).unwrap();
        assert_eq!(
            drive.behavior_regions().collect::<Vec<_>>(),
            vec![motion, RegionIndex::ROOT]
        );

        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle).region_behavior("motion", || crate::runtime::Passive))
            .state(
                StateBuilder::new(Mission)
                    .region("motion", Drive)
                    .region("safety", Watch),
            )
            .state(
                StateBuilder::new(Drive)
                    .within(Mission, "motion")
                    .region_behavior("safety", || crate::runtime::Passive)
                    .region_behavior("arm", || crate::runtime::Passive),
            )
            .state(StateBuilder::new(Watch).within(Mission, "safety"))
            .build();

        let errors = errors(result);
        for (state, region) in [("Idle", "motion"), ("Drive", "safety"), ("Drive", "arm")] {
            assert!(errors.contains(&DefinitionError::BehaviorOutsideRegion {
                state: state.into(),
                region: region.into()
            }));
        }
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn logic_units_need_inputs() {
        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(
                StateBuilder::new(Idle)
                    .logic_unit(LogicUnit::all("never", Vec::new(), Key::Go))
                    .logic_unit(LogicUnit::any("either", [EventKind::Signal(Key::Halt)], Key::Go)),
            )
            .build();

        assert_eq!(
            errors(result),
            vec![DefinitionError::EmptyLogicUnit {
                state: "Idle".into(),
                unit: "never".into()
            }]
        );
    }

    #[test]
    fn resources_on_undeclared_regions_are_rejected() {
        struct Pose;
        impl Resource for Pose {}

        let result = MachineBuilder::<TestState, Key>::new()
            .initial(Idle)
            .state(StateBuilder::new(Idle).region_resource("arm", None, |_| Pose))
            .build();

        assert_eq!(
            errors(result),
            vec![DefinitionError::ResourceOutsideRegion {
                state: "Idle".into(),
                region: "arm".into()
            }]
        );
    }
}
