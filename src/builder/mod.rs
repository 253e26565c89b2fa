//! Builder API for declaring machines.
//!
//! A machine is declared once, validated once and then shared by every
//! instance created from it:
//!
//! - [`StateBuilder`] declares one state: its place in the hierarchy, its
//!   child regions, its history mode, its transition table and its behavior
//! - [`MachineBuilder`] collects the states and produces a
//!   [`MachineDefinition`], reporting every definition problem at once
//! - [`state_enum!`](crate::state_enum) derives a `StateId` for plain enums

pub mod definition;
pub mod error;
pub mod machine;
pub mod macros;
pub mod state;

pub use definition::{
    MachineDefinition, RegionDecl, RegionIndex, StateDecl, TransitionRule, TransitionScope,
    ROOT_REGION,
};
pub use error::{BuildError, DefinitionError};
pub use machine::MachineBuilder;
pub use state::StateBuilder;
