//! Core vocabulary of the runtime.
//!
//! This module contains the value types every other layer speaks:
//! - State identities via the `StateId` trait
//! - Events, outcome tags and origins
//! - Reactions returned by states
//! - History records and the tracker that keeps them
//! - Logic units folding several events into one trigger
//! - The machine-scoped global data store

mod data;
mod event;
mod history;
mod logic;
mod reaction;
mod state;

pub use data::{DataError, GlobalData};
pub use event::{ActionOutcome, ClientId, Event, EventKind, Origin, RequestId, Tag};
pub use history::{HistoryMode, HistoryRecord, HistoryTracker};
pub use logic::{Aggregation, LogicUnit};
pub use reaction::Reaction;
pub use state::{Signal, StateId};
