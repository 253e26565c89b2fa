//! Registry error types.

use std::any::type_name;
use thiserror::Error;

/// Errors raised while resolving or accessing registry entries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// Nothing registered for the key, or the handle points at a released entry
    #[error("No {type_name} registered{}", name_suffix(.name))]
    NotFound {
        type_name: &'static str,
        name: Option<String>,
    },

    /// Key already taken in this region
    #[error("{type_name} already registered{}", name_suffix(.name))]
    AlreadyRegistered {
        type_name: &'static str,
        name: Option<String>,
    },

    /// Mutable access attempted from outside the owning region's scope
    #[error("{type_name} in region '{region}' is read-only from here")]
    ReadOnly {
        type_name: &'static str,
        region: String,
    },

    /// No live region with this name is visible from the caller
    #[error("No sibling region named '{region}'")]
    UnknownRegion { region: String },
}

impl RegistryError {
    pub(crate) fn not_found<T>(name: Option<&str>) -> Self {
        RegistryError::NotFound {
            type_name: type_name::<T>(),
            name: name.map(str::to_string),
        }
    }
}

fn name_suffix(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" under name '{name}'"),
        None => String::new(),
    }
}
