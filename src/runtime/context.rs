//! Machine access handed to state hooks.

use super::error::StateError;
use super::hierarchy::MachineCore;
use super::queue::EventSender;
use crate::builder::RegionIndex;
use crate::core::{DataError, Event, GlobalData, Signal, StateId};
use crate::registry::{Handle, RegistryError, Resource, ResourceScope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any};

/// Explicit, machine-owned context for one state's hook.
///
/// Everything a state may touch goes through here: the registries of its
/// region chain, the global data store, the event queue and the machine
/// parameters. The context only lives for the duration of one hook call.
///
/// A region behavior works in the region it is attached to: resources it
/// requires or publishes land there, and lookups start there.
pub struct StateContext<'a, S: StateId, K: Signal> {
    core: &'a mut MachineCore<S, K>,
    state: S,
    home: RegionIndex,
}

impl<'a, S: StateId, K: Signal> StateContext<'a, S, K> {
    pub(crate) fn new(core: &'a mut MachineCore<S, K>, state: S, home: RegionIndex) -> Self {
        Self { core, state, home }
    }

    /// The state whose hook is running.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Region the running behavior works in: the one containing the state,
    /// or the region a region behavior is attached to.
    pub fn region(&self) -> RegionIndex {
        self.home
    }

    /// Tag of [`region`](Self::region).
    pub fn region_name(&self) -> &str {
        self.core.definition.region_name(self.region())
    }

    /// Queue an event behind everything already queued. It is processed
    /// in a later cycle, never re-entrantly.
    pub fn post_event(&self, event: Event<K>) -> Result<(), StateError> {
        Ok(self.core.sender.post(event)?)
    }

    pub fn post_signal(&self, signal: K) -> Result<(), StateError> {
        self.post_event(Event::signal(signal))
    }

    /// Sender for code that outlives the hook (threads, callbacks).
    pub fn sender(&self) -> EventSender<K> {
        self.core.sender.clone()
    }

    /// Find a `T` registered under `name` in the behavior's region or any
    /// enclosing region; construct and register one in the behavior's own
    /// region if there is none. A constructed resource is released when the
    /// state exits.
    pub fn require<T, F>(&mut self, name: Option<&str>, factory: F) -> Result<Handle<T>, StateError>
    where
        T: Resource,
        F: FnOnce(&ResourceScope<K>) -> T,
    {
        if let Some(handle) = self.lookup::<T>(name) {
            return Ok(handle);
        }

        let region = self.region();
        let value = factory(&self.core.scope(region));
        let serial = self.core.next_serial();
        let node = self
            .core
            .node_mut(region)
            .ok_or_else(|| RegistryError::not_found::<T>(name))?;
        node.registry
            .insert(name, value, serial, Some(self.state.clone()))?;

        tracing::debug!(
            state = self.state.name(),
            resource = type_name::<T>(),
            name = name.unwrap_or_default(),
            "resource constructed"
        );
        Ok(Handle::new(region, serial))
    }

    /// Like [`require`](Self::require) without construction.
    pub fn resolve<T: Resource>(&self, name: Option<&str>) -> Result<Handle<T>, StateError> {
        self.lookup::<T>(name)
            .ok_or_else(|| RegistryError::not_found::<T>(name).into())
    }

    /// Register `value` in the behavior's region. Unlike required resources a
    /// published component outlives the state and is released with the
    /// region.
    pub fn publish<T: Resource>(&mut self, name: &str, value: T) -> Result<Handle<T>, StateError> {
        let region = self.region();
        let serial = self.core.next_serial();
        let node = self
            .core
            .node_mut(region)
            .ok_or_else(|| RegistryError::not_found::<T>(Some(name)))?;
        node.registry.insert(Some(name), value, serial, None)?;
        Ok(Handle::new(region, serial))
    }

    pub fn get<T: Resource>(&self, handle: Handle<T>) -> Result<&T, StateError> {
        let node = self
            .core
            .node(handle.region())
            .ok_or_else(|| RegistryError::not_found::<T>(None))?;
        Ok(node.registry.get::<T>(handle.serial())?)
    }

    /// Mutable access, only for resources of the behavior's region chain.
    pub fn get_mut<T: Resource>(&mut self, handle: Handle<T>) -> Result<&mut T, StateError> {
        if !self.chain().contains(&handle.region()) {
            return Err(RegistryError::ReadOnly {
                type_name: type_name::<T>(),
                region: self.core.definition.region_name(handle.region()).to_string(),
            }
            .into());
        }
        let node = self
            .core
            .node_mut(handle.region())
            .ok_or_else(|| RegistryError::not_found::<T>(None))?;
        Ok(node.registry.get_mut::<T>(handle.serial())?)
    }

    /// Read-only lookup in a live region of any enclosing composite, e.g.
    /// an orthogonal sibling of the state's own region.
    pub fn sibling<T: Resource>(&self, region: &str, name: Option<&str>) -> Result<&T, StateError> {
        let definition = &self.core.definition;
        let ancestry = definition.ancestry(&self.state);
        let visible = definition.region_named(region).filter(|index| {
            definition
                .region(*index)
                .is_some_and(|decl| decl.owner().map_or(true, |owner| ancestry.contains(owner)))
        });
        let node = visible
            .and_then(|index| self.core.node(index))
            .ok_or_else(|| RegistryError::UnknownRegion {
                region: region.to_string(),
            })?;
        let serial = node
            .registry
            .find::<T>(name)
            .ok_or_else(|| RegistryError::not_found::<T>(name))?;
        Ok(node.registry.get::<T>(serial)?)
    }

    pub fn set_global<T: Any + Send>(&mut self, name: &str, value: T) -> Result<(), DataError> {
        self.core.globals.set(name, value)
    }

    pub fn global<T: Any + Clone>(&self, name: &str) -> Result<T, DataError> {
        self.core.globals.get(name)
    }

    pub fn globals(&self) -> &GlobalData {
        &self.core.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalData {
        &mut self.core.globals
    }

    /// Machine parameter `name`, or `default` if unset.
    pub fn param<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T, StateError> {
        match self.core.config.param(name) {
            Some(value) => Ok(value?),
            None => Ok(default),
        }
    }

    /// Set machine parameter `name` for every state that reads it later.
    pub fn set_param<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), StateError> {
        Ok(self.core.config.set_param(name, value)?)
    }

    /// Regions from the behavior's region outwards.
    fn chain(&self) -> Vec<RegionIndex> {
        let mut chain = self.core.definition.region_chain(&self.state);
        if let Some(start) = chain.iter().position(|region| *region == self.home) {
            chain.drain(..start);
        }
        chain
    }

    fn lookup<T: Resource>(&self, name: Option<&str>) -> Option<Handle<T>> {
        self.chain()
            .into_iter()
            .find_map(|region| {
                let serial = self.core.node(region)?.registry.find::<T>(name)?;
                Some(Handle::new(region, serial))
            })
    }
}
