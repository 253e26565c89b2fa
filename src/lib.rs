//! Orthos: a hierarchical, concurrent-region state machine runtime
//!
//! Orthos drives long-running asynchronous behaviors (navigation, sensing,
//! manipulation) with statecharts: states nest inside regions, a composite
//! state may run several orthogonal regions at once, and every external
//! operation reports back as an ordinary event on a single run-to-completion
//! queue.
//!
//! # Core Concepts
//!
//! - **States**: a plain enum implementing `StateId`, plus an optional
//!   `StateBehavior` constructed on entry
//! - **Regions**: exclusive slots with exactly one active child; each owns a
//!   registry of clients and components
//! - **Events**: user signals, action outcomes, feedback and timer ticks,
//!   routed innermost state first
//! - **Action clients**: adapters turning external request/response
//!   interactions into outcome events, cancelled when their region goes away
//! - **History**: shallow or deep restoration of a composite's last
//!   configuration
//! - **Global data**: a typed key/value store scoped to one machine
//!
//! # Example
//!
//! ```rust
//! use orthos::builder::{MachineBuilder, StateBuilder};
//! use orthos::core::HistoryMode;
//! use orthos::runtime::{Machine, MachineConfig};
//! use orthos::state_enum;
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Robot {
//!         Idle,
//!         Patrol,
//!         Forward,
//!         Rotate,
//!         Scan,
//!     }
//! }
//!
//! #[derive(Clone, PartialEq, Eq, Hash, Debug)]
//! enum Signal {
//!     Start,
//!     Turn,
//!     Pause,
//! }
//!
//! let definition = MachineBuilder::new()
//!     .initial(Robot::Idle)
//!     .state(StateBuilder::new(Robot::Idle).on_signal(Signal::Start, Robot::Patrol))
//!     .state(
//!         StateBuilder::new(Robot::Patrol)
//!             .region("base", Robot::Forward)
//!             .region("sensors", Robot::Scan)
//!             .history(HistoryMode::Shallow)
//!             .on_signal(Signal::Pause, Robot::Idle),
//!     )
//!     .state(
//!         StateBuilder::new(Robot::Forward)
//!             .within(Robot::Patrol, "base")
//!             .on_signal(Signal::Turn, Robot::Rotate),
//!     )
//!     .state(StateBuilder::new(Robot::Rotate).within(Robot::Patrol, "base"))
//!     .state(StateBuilder::new(Robot::Scan).within(Robot::Patrol, "sensors"))
//!     .build()
//!     .unwrap();
//!
//! let mut machine = Machine::new(Arc::new(definition), MachineConfig::default());
//! machine.start().unwrap();
//!
//! for signal in [Signal::Start, Signal::Turn, Signal::Pause, Signal::Start] {
//!     machine.signal(signal).unwrap();
//! }
//! machine.process_pending().unwrap();
//!
//! // Shallow history brought the base region back to Rotate.
//! assert_eq!(machine.active_in("base"), Some(&Robot::Rotate));
//! assert_eq!(machine.active_in("sensors"), Some(&Robot::Scan));
//! ```

pub mod action;
pub mod builder;
pub mod core;
pub mod registry;
pub mod runtime;
pub mod timer;

// Re-export commonly used types
pub use action::{ActionClient, ActionServer, GoalHandle, RetryPolicy};
pub use builder::{BuildError, MachineBuilder, MachineDefinition, StateBuilder};
pub use core::{ActionOutcome, Event, EventKind, HistoryMode, LogicUnit, Reaction, StateId, Tag};
pub use registry::{Handle, Resource};
pub use runtime::{Dispatch, Machine, MachineConfig, MachineError, StateBehavior, StateContext, StateError};
pub use timer::{TimerClient, TimerError, TimerMode};
