//! Build errors for machine definitions.

use thiserror::Error;

/// One problem found in a machine definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("State '{state}' is referenced but never declared")]
    UnknownState { state: String },

    #[error("State '{state}' declared more than once")]
    DuplicateState { state: String },

    #[error("Region '{region}' declared more than once")]
    DuplicateRegion { region: String },

    #[error("State '{state}' declares a region with the reserved name 'machine'")]
    ReservedRegion { state: String },

    #[error("State '{state}' places itself in region '{region}', which '{parent}' does not declare")]
    UnknownRegion {
        state: String,
        parent: String,
        region: String,
    },

    #[error("State '{state}' attaches a resource to undeclared region '{region}'")]
    ResourceOutsideRegion { state: String, region: String },

    #[error("Initial state '{state}' of region '{region}' does not belong to that region")]
    InitialNotInRegion { region: String, state: String },

    #[error("Machine initial state '{state}' is not a top-level state")]
    TopLevelInitial { state: String },

    #[error("State '{state}' is its own ancestor")]
    CyclicHierarchy { state: String },

    #[error("State '{state}' has overlapping transitions on {event}")]
    AmbiguousTransition { state: String, event: String },

    #[error("State '{state}' attaches a behavior to region '{region}', which does not enclose it")]
    BehaviorOutsideRegion { state: String, region: String },

    #[error("Logic unit '{unit}' of state '{state}' has no inputs")]
    EmptyLogicUnit { state: String, unit: String },
}

/// Errors that can occur when building a machine definition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    /// Every problem found, not just the first.
    #[error("Invalid machine definition: {}", join(.0))]
    Invalid(Vec<DefinitionError>),
}

impl BuildError {
    pub fn errors(&self) -> &[DefinitionError] {
        match self {
            BuildError::Invalid(errors) => errors,
        }
    }
}

fn join(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
