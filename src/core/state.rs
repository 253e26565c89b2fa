//! Identity traits for states and user signals.
//!
//! States are addressed by value: every state id appears at exactly one
//! place in the hierarchy, so at most one instance of a state is live at a
//! time and the id doubles as the arena key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;

/// Trait for state identities.
///
/// Implemented by a plain enumeration naming every state of the machine.
/// The behavior of a state lives in a separate [`StateBehavior`] object
/// created on entry; the id itself carries no data.
///
/// # Required Traits
///
/// - `Clone` + `Eq` + `Hash`: ids key the active-state arena and the
///   transition table
/// - `Debug`: ids appear in diagnostics
/// - `Serialize` + `Deserialize`: ids appear in snapshots and the
///   transition log
///
/// # Example
///
/// ```rust
/// use orthos::core::StateId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Mission {
///     AcquireSensors,
///     Navigate,
///     Recovery,
/// }
///
/// impl StateId for Mission {
///     fn name(&self) -> &str {
///         match self {
///             Self::AcquireSensors => "AcquireSensors",
///             Self::Navigate => "Navigate",
///             Self::Recovery => "Recovery",
///         }
///     }
/// }
/// ```
///
/// [`StateBehavior`]: crate::runtime::StateBehavior
pub trait StateId:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;
}

/// Marker for user-defined event kinds.
///
/// Blanket-implemented for every type that can key a transition table.
pub trait Signal: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> Signal for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
