//! Machine-scoped global data store.
//!
//! One value per name, last write wins, no type migration. Only the
//! event-processing thread touches the store, so there is no locking.

use std::any::{type_name, Any};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by the global data store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error("No global data named '{name}'")]
    NotFound { name: String },

    #[error("Global data '{name}' holds {stored}, not {requested}")]
    TypeMismatch {
        name: String,
        stored: &'static str,
        requested: &'static str,
    },
}

struct Slot {
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

/// Typed key/value context shared by every region of one machine.
#[derive(Default)]
pub struct GlobalData {
    slots: HashMap<String, Slot>,
}

impl GlobalData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name`.
    ///
    /// Overwrites an existing value of the same type; a value of another
    /// type is rejected with [`DataError::TypeMismatch`].
    pub fn set<T: Any + Send>(&mut self, name: impl Into<String>, value: T) -> Result<(), DataError> {
        let name = name.into();
        if let Some(slot) = self.slots.get_mut(&name) {
            if !slot.value.is::<T>() {
                return Err(DataError::TypeMismatch {
                    name,
                    stored: slot.type_name,
                    requested: type_name::<T>(),
                });
            }
            slot.value = Box::new(value);
            return Ok(());
        }
        self.slots.insert(
            name,
            Slot {
                type_name: type_name::<T>(),
                value: Box::new(value),
            },
        );
        Ok(())
    }

    /// Copy of the value stored under `name`.
    pub fn get<T: Any + Clone>(&self, name: &str) -> Result<T, DataError> {
        self.get_ref::<T>(name).cloned()
    }

    pub fn get_ref<T: Any>(&self, name: &str) -> Result<&T, DataError> {
        let slot = self.slots.get(name).ok_or_else(|| DataError::NotFound {
            name: name.to_string(),
        })?;
        slot.value
            .downcast_ref::<T>()
            .ok_or_else(|| DataError::TypeMismatch {
                name: name.to_string(),
                stored: slot.type_name,
                requested: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T, DataError> {
        let slot = self.slots.get_mut(name).ok_or_else(|| DataError::NotFound {
            name: name.to_string(),
        })?;
        let stored = slot.type_name;
        slot.value
            .downcast_mut::<T>()
            .ok_or_else(|| DataError::TypeMismatch {
                name: name.to_string(),
                stored,
                requested: type_name::<T>(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let mut data = GlobalData::new();
        data.set("yaw", 1.57_f64).unwrap();
        assert_eq!(data.get::<f64>("yaw"), Ok(1.57));
    }

    #[test]
    fn missing_name_is_not_found() {
        let data = GlobalData::new();
        assert_eq!(
            data.get::<f64>("missing"),
            Err(DataError::NotFound {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn last_write_wins() {
        let mut data = GlobalData::new();
        data.set("iteration", 1_u32).unwrap();
        data.set("iteration", 2_u32).unwrap();
        assert_eq!(data.get::<u32>("iteration"), Ok(2));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn type_is_fixed_by_first_write() {
        let mut data = GlobalData::new();
        data.set("yaw", 1.57_f64).unwrap();

        let err = data.set("yaw", "north".to_string()).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
        assert!(matches!(
            data.get::<String>("yaw"),
            Err(DataError::TypeMismatch { .. })
        ));
        assert_eq!(data.get::<f64>("yaw"), Ok(1.57));
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut data = GlobalData::new();
        data.set("poses", vec![1, 2]).unwrap();
        data.get_mut::<Vec<i32>>("poses").unwrap().push(3);
        assert_eq!(data.get::<Vec<i32>>("poses"), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn clear_empties_store() {
        let mut data = GlobalData::new();
        data.set("b", 1_u8).unwrap();
        data.set("a", 2_u8).unwrap();
        assert_eq!(data.names(), vec!["a".to_string(), "b".to_string()]);
        data.clear();
        assert!(data.is_empty());
    }
}
