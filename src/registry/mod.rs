//! Client/component registry.
//!
//! Every region owns a [`Registry`]. Resources are keyed by type and an
//! optional explicit name, so several instances of one type can coexist in
//! a region when they are named. States hold copyable [`Handle`]s instead
//! of references; the machine resolves a handle back to the value on the
//! event-processing thread.
//!
//! Dropping a registry entry is how a resource is released: action clients
//! cancel their in-flight request in `Drop`, timers stop ticking.

mod error;
mod handle;
mod scope;

pub use error::RegistryError;
pub use handle::Handle;
pub use scope::ResourceScope;

use crate::core::{ClientId, Origin, StateId};
use std::any::{type_name, Any, TypeId};

/// Upcast helper so registry entries can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Anything a region can own: clients talking to the outside world and
/// passive components holding shared data.
///
/// Passive components only need an empty impl:
///
/// ```rust
/// use orthos::registry::Resource;
///
/// struct TrackedPose {
///     x: f64,
///     y: f64,
/// }
///
/// impl Resource for TrackedPose {}
/// ```
pub trait Resource: AsAny + Send {
    /// Identity stamped on the events this resource posts, if any.
    fn client_id(&self) -> Option<ClientId> {
        None
    }

    /// Decide whether an event posted by this resource is still current.
    ///
    /// Called on the event-processing thread right before the event is
    /// routed. `terminal` is true for events that close their request.
    fn admit(&mut self, origin: &Origin, terminal: bool) -> bool {
        let _ = (origin, terminal);
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct RegistryKey {
    type_id: TypeId,
    name: Option<String>,
}

impl RegistryKey {
    fn of<T: 'static>(name: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: name.map(str::to_string),
        }
    }
}

struct Entry<S> {
    key: RegistryKey,
    type_name: &'static str,
    serial: u64,
    created_by: Option<S>,
    value: Box<dyn Resource>,
}

/// Description of one registry entry, for snapshots.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntryInfo {
    pub type_name: String,
    pub name: Option<String>,
    pub client: bool,
}

/// Resources owned by one region, in insertion order.
pub struct Registry<S: StateId> {
    entries: Vec<Entry<S>>,
}

impl<S: StateId> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateId> Registry<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `value`. `serial` must be unique across the machine; it is
    /// what handles point at.
    pub fn insert<T: Resource>(
        &mut self,
        name: Option<&str>,
        value: T,
        serial: u64,
        created_by: Option<S>,
    ) -> Result<(), RegistryError> {
        self.insert_boxed(
            RegistryKey::of::<T>(name),
            type_name::<T>(),
            Box::new(value),
            serial,
            created_by,
        )
    }

    pub(crate) fn insert_erased(
        &mut self,
        type_id: TypeId,
        type_name: &'static str,
        name: Option<&str>,
        value: Box<dyn Resource>,
        serial: u64,
    ) -> Result<(), RegistryError> {
        let key = RegistryKey {
            type_id,
            name: name.map(str::to_string),
        };
        self.insert_boxed(key, type_name, value, serial, None)
    }

    fn insert_boxed(
        &mut self,
        key: RegistryKey,
        type_name: &'static str,
        value: Box<dyn Resource>,
        serial: u64,
        created_by: Option<S>,
    ) -> Result<(), RegistryError> {
        if self.entries.iter().any(|e| e.key == key) {
            return Err(RegistryError::AlreadyRegistered {
                type_name,
                name: key.name,
            });
        }
        self.entries.push(Entry {
            key,
            type_name,
            serial,
            created_by,
            value,
        });
        Ok(())
    }

    /// Serial of the entry registered for `(T, name)`.
    pub fn find<T: Resource>(&self, name: Option<&str>) -> Option<u64> {
        let key = RegistryKey::of::<T>(name);
        self.entries.iter().find(|e| e.key == key).map(|e| e.serial)
    }

    pub fn contains_serial(&self, serial: u64) -> bool {
        self.entries.iter().any(|e| e.serial == serial)
    }

    pub fn get<T: Resource>(&self, serial: u64) -> Result<&T, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.serial == serial)
            .and_then(|e| AsAny::as_any(&*e.value).downcast_ref::<T>())
            .ok_or_else(|| RegistryError::not_found::<T>(None))
    }

    pub fn get_mut<T: Resource>(&mut self, serial: u64) -> Result<&mut T, RegistryError> {
        self.entries
            .iter_mut()
            .find(|e| e.serial == serial)
            .and_then(|e| AsAny::as_any_mut(&mut *e.value).downcast_mut::<T>())
            .ok_or_else(|| RegistryError::not_found::<T>(None))
    }

    /// Drop every entry `state` created, newest first. Returns how many
    /// entries were released.
    pub fn release_created_by(&mut self, state: &S) -> usize {
        let mut released = 0;
        let mut index = self.entries.len();
        while index > 0 {
            index -= 1;
            if self.entries[index].created_by.as_ref() == Some(state) {
                let entry = self.entries.remove(index);
                tracing::debug!(
                    state = state.name(),
                    resource = entry.type_name,
                    "releasing resource created by exiting state"
                );
                drop(entry);
                released += 1;
            }
        }
        released
    }

    /// Drop every entry, newest first.
    pub fn clear(&mut self) {
        while let Some(entry) = self.entries.pop() {
            drop(entry);
        }
    }

    /// Route an origin check to the client that posted the event.
    /// `None` if no entry of this registry carries that client id.
    pub fn admit(&mut self, origin: &Origin, terminal: bool) -> Option<bool> {
        self.entries
            .iter_mut()
            .find(|e| e.value.client_id() == Some(origin.client))
            .map(|e| e.value.admit(origin, terminal))
    }

    pub fn describe(&self) -> Vec<EntryInfo> {
        self.entries
            .iter()
            .map(|e| EntryInfo {
                type_name: e.type_name.to_string(),
                name: e.key.name.clone(),
                client: e.value.client_id().is_some(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: StateId> Drop for Registry<S> {
    fn drop(&mut self) {
        self.clear();
    }
}
