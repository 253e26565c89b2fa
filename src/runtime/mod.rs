//! Machine runtime.
//!
//! A [`Machine`] owns the live state/region tree, the per-region registries,
//! the global data store, the history tracker and a single FIFO event
//! queue. Events are processed one at a time to completion:
//!
//! 1. Events posted by clients that no longer exist, or answering a request
//!    their client has superseded, are discarded as stale.
//! 2. Logic units of the active states observe the event and queue their
//!    trigger signals once their condition holds.
//! 3. The active states are offered the event innermost first. Every
//!    behavior of a state, its own and its region behaviors, runs
//!    [`StateBehavior::react`] before the state's transition table. Two of
//!    them transitioning on one event is fatal.
//! 4. The first state to transition or consume ends the cycle; an event
//!    nobody handles is dropped.
//!
//! A transition exits the subtree below the least common region and enters
//! the target along its ancestry, restoring history where declared.

mod behavior;
mod config;
mod context;
mod error;
mod hierarchy;
mod log;
mod machine;
mod queue;
mod router;
mod snapshot;

pub use behavior::{Passive, StateBehavior};
pub use config::{ConfigError, MachineConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_LOG_CAPACITY};
pub use context::StateContext;
pub use error::{Hook, MachineError, StateError};
pub use log::{TransitionLog, TransitionRecord};
pub use machine::{Machine, MachineStatus};
pub use queue::{EventReceiver, EventSender, QueueClosed};
pub use router::Dispatch;
pub use snapshot::{ConfigurationSnapshot, RegionSnapshot, SnapshotError, SNAPSHOT_VERSION};

#[cfg(test)]
pub(crate) use queue::event_channel;
