//! Action client adapter.
//!
//! Wraps an asynchronous request/response endpoint so that its completions
//! reach the machine as ordinary events. The endpoint itself is abstracted
//! by [`ActionServer`]; the adapter handles the handshake, the request
//! identity used to discard stale results, local outcome callbacks and the
//! retry ceiling.

mod client;
mod error;
mod retry;
mod server;

pub use crate::core::ActionOutcome;
pub use client::ActionClient;
pub use error::ActionError;
pub use retry::{Backoff, RetryDecision, RetryError, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use server::{ActionServer, GoalHandle};
