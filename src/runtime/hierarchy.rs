//! Live state/region tree and its construction and destruction.
//!
//! The tree is an arena owned by the machine: region nodes are indexed by
//! [`RegionIndex`], active states by their id. A region node exists exactly
//! while its owner is active and holds the region's registry and its single
//! active child.

use super::behavior::{Passive, StateBehavior};
use super::config::MachineConfig;
use super::context::StateContext;
use super::error::{Hook, MachineError, StateError};
use super::log::TransitionLog;
use super::queue::EventSender;
use crate::builder::{MachineDefinition, RegionIndex};
use crate::core::{
    Event, EventKind, GlobalData, HistoryMode, HistoryRecord, HistoryTracker, LogicUnit, Reaction,
    Signal, StateId,
};
use crate::registry::{Registry, ResourceScope};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct RegionNode<S: StateId> {
    pub(crate) active: Option<S>,
    pub(crate) registry: Registry<S>,
}

struct ActiveState<S: StateId, K: Signal> {
    // Taken out while one of its hooks runs.
    behavior: Option<Box<dyn StateBehavior<S, K>>>,
    attached: Vec<Attached<S, K>>,
    logic_units: Vec<LogicUnit<K>>,
}

struct Attached<S: StateId, K: Signal> {
    region: RegionIndex,
    behavior: Option<Box<dyn StateBehavior<S, K>>>,
}

/// One behavior of an active state.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Own,
    Attached(usize),
}

pub(crate) struct MachineCore<S: StateId, K: Signal> {
    pub(crate) definition: Arc<MachineDefinition<S, K>>,
    pub(crate) config: MachineConfig,
    pub(crate) sender: EventSender<K>,
    pub(crate) regions: Vec<Option<RegionNode<S>>>,
    active: HashMap<S, ActiveState<S, K>>,
    pub(crate) globals: GlobalData,
    pub(crate) history: HistoryTracker<S>,
    pub(crate) log: TransitionLog<S>,
    next_serial: u64,
}

impl<S: StateId, K: Signal> MachineCore<S, K> {
    pub(crate) fn new(
        definition: Arc<MachineDefinition<S, K>>,
        config: MachineConfig,
        sender: EventSender<K>,
    ) -> Self {
        let regions = (0..definition.region_count()).map(|_| None).collect();
        let log = TransitionLog::new(config.transition_log_capacity);
        Self {
            definition,
            config,
            sender,
            regions,
            active: HashMap::new(),
            globals: GlobalData::new(),
            history: HistoryTracker::new(),
            log,
            next_serial: 0,
        }
    }

    pub(crate) fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    pub(crate) fn scope(&self, region: RegionIndex) -> ResourceScope<K> {
        ResourceScope::new(
            self.definition.region_name(region),
            self.sender.clone(),
            self.config.connect_timeout(),
            self.config.retry.clone(),
        )
    }

    pub(crate) fn node(&self, region: RegionIndex) -> Option<&RegionNode<S>> {
        self.regions.get(region.index()).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, region: RegionIndex) -> Option<&mut RegionNode<S>> {
        self.regions.get_mut(region.index()).and_then(Option::as_mut)
    }

    pub(crate) fn is_active(&self, state: &S) -> bool {
        self.active.contains_key(state)
    }

    /// Active child of a live region.
    pub(crate) fn active_child(&self, region: RegionIndex) -> Option<&S> {
        self.node(region).and_then(|node| node.active.as_ref())
    }

    /// Active states, outermost first, regions in declaration order.
    pub(crate) fn pre_order(&self) -> Vec<S> {
        let mut out = Vec::with_capacity(self.active.len());
        self.visit(RegionIndex::ROOT, &mut out, true);
        out
    }

    /// Active states, innermost first: each region's leaf before the
    /// states enclosing it, regions in declaration order.
    pub(crate) fn post_order(&self) -> Vec<S> {
        let mut out = Vec::with_capacity(self.active.len());
        self.visit(RegionIndex::ROOT, &mut out, false);
        out
    }

    fn visit(&self, region: RegionIndex, out: &mut Vec<S>, pre: bool) {
        let Some(state) = self.active_child(region) else {
            return;
        };
        if pre {
            out.push(state.clone());
        }
        if let Some(decl) = self.definition.state(state) {
            for child in decl.regions() {
                self.visit(*child, out, pre);
            }
        }
        if !pre {
            out.push(state.clone());
        }
    }

    /// Create a region node and install its declared resources.
    pub(crate) fn open_region(&mut self, region: RegionIndex) -> Result<(), MachineError> {
        let definition = Arc::clone(&self.definition);
        let Some(decl) = definition.region(region) else {
            return Ok(());
        };

        let scope = self.scope(region);
        let mut registry = Registry::new();
        for resource in &decl.resources {
            let value = (resource.factory)(&scope);
            let serial = self.next_serial();
            registry
                .insert_erased(
                    resource.type_id,
                    resource.type_name,
                    resource.name.as_deref(),
                    value,
                    serial,
                )
                .map_err(|source| MachineError::Resource {
                    region: decl.name().to_string(),
                    source,
                })?;
        }

        tracing::debug!(region = decl.name(), resources = registry.len(), "region constructed");
        if let Some(slot) = self.regions.get_mut(region.index()) {
            *slot = Some(RegionNode {
                active: None,
                registry,
            });
        }
        Ok(())
    }

    /// Destroy a region node, releasing its registry newest first.
    pub(crate) fn close_region(&mut self, region: RegionIndex) {
        if let Some(mut node) = self.regions.get_mut(region.index()).and_then(Option::take) {
            node.registry.clear();
            tracing::debug!(
                region = self.definition.region_name(region),
                "region destroyed"
            );
        }
    }

    /// Enter `state` and build its subtree.
    ///
    /// `path` names states below `state` that must be entered on the way to
    /// a transition target; `restore` is a deep-history configuration
    /// inherited from an enclosing state.
    pub(crate) fn enter(
        &mut self,
        state: &S,
        path: &[S],
        restore: Option<&[S]>,
    ) -> Result<(), MachineError> {
        let definition = Arc::clone(&self.definition);
        let decl = definition
            .state(state)
            .ok_or_else(|| MachineError::UnknownTarget {
                state: state.name().to_string(),
            })?;

        if let Some(node) = self.node_mut(decl.parent()) {
            node.active = Some(state.clone());
        }
        tracing::debug!(
            state = state.name(),
            region = definition.region_name(decl.parent()),
            "entering state"
        );

        let behavior: Box<dyn StateBehavior<S, K>> = match &decl.behavior {
            Some(factory) => factory(),
            None => Box::new(Passive),
        };
        let attached = decl
            .attached
            .iter()
            .map(|a| Attached {
                region: a.region,
                behavior: Some((a.factory)()),
            })
            .collect();
        self.active.insert(
            state.clone(),
            ActiveState {
                behavior: Some(behavior),
                attached,
                logic_units: decl.logic_units().to_vec(),
            },
        );
        self.run_hook(state, Hook::Initialize)?;
        self.run_hook(state, Hook::Entry)?;

        if !decl.is_composite() {
            return Ok(());
        }

        let recorded = match decl.history() {
            HistoryMode::None => None,
            _ => self.history.retrieve(state).cloned(),
        };
        let restore: Option<Vec<S>> = match (restore, &recorded) {
            (Some(inherited), _) => Some(inherited.to_vec()),
            (None, Some(HistoryRecord::Deep(states))) => Some(states.clone()),
            _ => None,
        };
        let shallow: &[S] = match &recorded {
            Some(HistoryRecord::Shallow(states)) => states.as_slice(),
            _ => &[],
        };

        for region in decl.regions() {
            self.open_region(*region)?;

            let in_region = |s: &&S| definition.parent_region(s) == Some(*region);
            if let Some(next) = path.first().filter(|s| in_region(s)) {
                // The path leads to the transition target, which gets its
                // own configuration rather than the enclosing one.
                self.enter(next, &path[1..], None)?;
                continue;
            }
            let remembered = restore
                .as_deref()
                .and_then(|states| states.iter().find(in_region))
                .or_else(|| shallow.iter().find(in_region));
            let child = match (remembered, definition.region(*region)) {
                (Some(child), _) => child,
                (None, Some(declared)) => declared.initial(),
                (None, None) => continue,
            };
            self.enter(child, &[], restore.as_deref())?;
        }
        Ok(())
    }

    /// Exit `state` and tear down its subtree.
    pub(crate) fn exit(&mut self, state: &S) -> Result<(), MachineError> {
        let definition = Arc::clone(&self.definition);
        let Some(decl) = definition.state(state) else {
            return Ok(());
        };

        match decl.history() {
            HistoryMode::None => {}
            HistoryMode::Shallow => {
                let children = decl
                    .regions()
                    .iter()
                    .filter_map(|r| self.active_child(*r).cloned())
                    .collect();
                self.history
                    .record(state.clone(), HistoryRecord::Shallow(children));
            }
            HistoryMode::Deep => {
                let mut descendants = Vec::new();
                for region in decl.regions() {
                    self.visit(*region, &mut descendants, true);
                }
                self.history
                    .record(state.clone(), HistoryRecord::Deep(descendants));
            }
        }

        for region in decl.regions().iter().rev() {
            if let Some(child) = self.active_child(*region).cloned() {
                self.exit(&child)?;
            }
            self.close_region(*region);
        }

        self.run_hook(state, Hook::Exit)?;

        for region in definition.region_chain(state) {
            if let Some(node) = self.node_mut(region) {
                node.registry.release_created_by(state);
            }
        }
        if let Some(node) = self.node_mut(decl.parent()) {
            node.active = None;
        }
        self.active.remove(state);
        tracing::debug!(state = state.name(), "exited state");
        Ok(())
    }

    /// Exit everything, running exit hooks, and release the root region.
    pub(crate) fn exit_all(&mut self) -> Result<(), MachineError> {
        if let Some(top) = self.active_child(RegionIndex::ROOT).cloned() {
            self.exit(&top)?;
        }
        self.close_region(RegionIndex::ROOT);
        Ok(())
    }

    /// Drop the whole tree without running hooks. Regions are released in
    /// reverse declaration order, each registry newest first.
    pub(crate) fn teardown(&mut self) {
        self.active.clear();
        for index in (0..self.regions.len()).rev() {
            self.close_region(RegionIndex::new(index));
        }
    }

    /// Feed `kind` to the logic units of the active states, outermost
    /// first. Returns the owning state, unit name and trigger of each unit
    /// that fired.
    pub(crate) fn observe(&mut self, kind: &EventKind<K>) -> Vec<(S, String, K)> {
        let mut fired = Vec::new();
        for state in self.pre_order() {
            let Some(active) = self.active.get_mut(&state) else {
                continue;
            };
            for unit in &mut active.logic_units {
                if let Some(trigger) = unit.observe(kind) {
                    fired.push((state.clone(), unit.name().to_string(), trigger));
                }
            }
        }
        fired
    }

    /// Own behavior first, then region behaviors in declaration order;
    /// exit hooks run in reverse.
    fn run_hook(&mut self, state: &S, hook: Hook) -> Result<(), MachineError> {
        let mut slots = self.slots(state);
        if hook == Hook::Exit {
            slots.reverse();
        }
        for slot in slots {
            self.with_behavior(state, slot, hook, (), |behavior, ctx| match hook {
                Hook::Initialize => behavior.on_initialize(ctx),
                Hook::Entry => behavior.on_entry(ctx),
                Hook::Exit => behavior.on_exit(ctx),
                Hook::React => Ok(()),
            })?;
        }
        Ok(())
    }

    /// Offer `event` to every behavior of `state`, own behavior first.
    pub(crate) fn react(
        &mut self,
        state: &S,
        event: &Event<K>,
    ) -> Result<Vec<Reaction<S>>, MachineError> {
        self.slots(state)
            .into_iter()
            .map(|slot| {
                self.with_behavior(state, slot, Hook::React, Reaction::Forward, |behavior, ctx| {
                    behavior.react(event, ctx)
                })
            })
            .collect()
    }

    fn slots(&self, state: &S) -> Vec<Slot> {
        let attached = self.active.get(state).map_or(0, |a| a.attached.len());
        std::iter::once(Slot::Own)
            .chain((0..attached).map(Slot::Attached))
            .collect()
    }

    fn with_behavior<T>(
        &mut self,
        state: &S,
        slot: Slot,
        hook: Hook,
        absent: T,
        call: impl FnOnce(
            &mut dyn StateBehavior<S, K>,
            &mut StateContext<'_, S, K>,
        ) -> Result<T, StateError>,
    ) -> Result<T, MachineError> {
        let Some((mut behavior, home)) = self.take_behavior(state, slot) else {
            return Ok(absent);
        };
        let result = {
            let mut ctx = StateContext::new(self, state.clone(), home);
            call(behavior.as_mut(), &mut ctx)
        };
        self.restore_behavior(state, slot, behavior);
        result.map_err(|source| MachineError::Hook {
            state: state.name().to_string(),
            hook,
            source,
        })
    }

    /// Take a behavior out together with the region it works in.
    fn take_behavior(
        &mut self,
        state: &S,
        slot: Slot,
    ) -> Option<(Box<dyn StateBehavior<S, K>>, RegionIndex)> {
        let active = self.active.get_mut(state)?;
        match slot {
            Slot::Own => {
                let home = self
                    .definition
                    .parent_region(state)
                    .unwrap_or(RegionIndex::ROOT);
                Some((active.behavior.take()?, home))
            }
            Slot::Attached(index) => {
                let attached = active.attached.get_mut(index)?;
                Some((attached.behavior.take()?, attached.region))
            }
        }
    }

    fn restore_behavior(&mut self, state: &S, slot: Slot, behavior: Box<dyn StateBehavior<S, K>>) {
        let Some(active) = self.active.get_mut(state) else {
            return;
        };
        match slot {
            Slot::Own => active.behavior = Some(behavior),
            Slot::Attached(index) => {
                if let Some(attached) = active.attached.get_mut(index) {
                    attached.behavior = Some(behavior);
                }
            }
        }
    }
}
