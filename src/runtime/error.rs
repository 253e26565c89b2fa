//! Runtime error types.

use super::config::ConfigError;
use super::machine::MachineStatus;
use super::queue::QueueClosed;
use crate::action::ActionError;
use crate::core::DataError;
use crate::registry::RegistryError;
use crate::timer::TimerError;
use std::fmt;
use thiserror::Error;

/// Failure raised by a state hook.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Closed(#[from] QueueClosed),

    #[error("{0}")]
    Failed(String),
}

impl StateError {
    pub fn failed(message: impl Into<String>) -> Self {
        StateError::Failed(message.into())
    }
}

/// Lifecycle hook of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    Initialize,
    Entry,
    Exit,
    React,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Initialize => "on_initialize",
            Hook::Entry => "on_entry",
            Hook::Exit => "on_exit",
            Hook::React => "react",
        };
        f.write_str(name)
    }
}

/// Errors raised while driving a machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("Machine not started. Call .start() first")]
    NotStarted,

    #[error("Machine already started")]
    AlreadyStarted,

    #[error("Machine is {status:?} and accepts no further events")]
    Halted { status: MachineStatus },

    /// Fatal: a hook failed, the configuration may be half-built.
    #[error("{hook} of state '{state}' failed: {source}")]
    Hook {
        state: String,
        hook: Hook,
        #[source]
        source: StateError,
    },

    /// Fatal: a second transition was committed for one event.
    #[error("Transition {second} committed while {first} was already committed for the same event")]
    DoubleTransition { first: String, second: String },

    #[error("Transition target '{state}' is not part of the machine")]
    UnknownTarget { state: String },

    #[error("Installing resources of region '{region}' failed: {source}")]
    Resource {
        region: String,
        #[source]
        source: RegistryError,
    },

    #[error(transparent)]
    Closed(#[from] QueueClosed),
}

impl MachineError {
    /// Whether the error leaves the machine unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MachineError::Hook { .. }
                | MachineError::DoubleTransition { .. }
                | MachineError::UnknownTarget { .. }
                | MachineError::Resource { .. }
        )
    }
}
