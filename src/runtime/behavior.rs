//! Per-state behavior hooks.

use super::context::StateContext;
use super::error::StateError;
use crate::core::{Event, Reaction, Signal, StateId};

/// Behavior attached to one state, constructed each time the state is
/// entered and dropped when it is exited.
///
/// Every hook has a default, so a state only overrides what it needs.
/// Returning an error from any hook is fatal for the machine.
///
/// # Hook order
///
/// On entry: `on_initialize`, `on_entry`, then the child regions are
/// constructed. On exit: the child regions are destroyed, then `on_exit`
/// runs, then the resources the state created are released.
///
/// A state's region behaviors run each hook after its own behavior, and
/// `on_exit` before it.
///
/// # Example
///
/// ```rust
/// use orthos::core::{Event, Reaction};
/// use orthos::runtime::{StateBehavior, StateContext, StateError};
/// use orthos::state_enum;
///
/// state_enum! {
///     enum Pattern {
///         Forward,
///         Return,
///     }
/// }
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Signal {
///     Bump,
/// }
///
/// struct Forward {
///     bumps: u32,
/// }
///
/// impl StateBehavior<Pattern, Signal> for Forward {
///     fn on_entry(&mut self, ctx: &mut StateContext<'_, Pattern, Signal>) -> Result<(), StateError> {
///         ctx.set_global("pattern", "forward".to_string())?;
///         Ok(())
///     }
///
///     fn react(
///         &mut self,
///         event: &Event<Signal>,
///         _ctx: &mut StateContext<'_, Pattern, Signal>,
///     ) -> Result<Reaction<Pattern>, StateError> {
///         if event.kind() == &orthos::core::EventKind::Signal(Signal::Bump) {
///             self.bumps += 1;
///             if self.bumps >= 3 {
///                 return Ok(Reaction::transition(Pattern::Return));
///             }
///             return Ok(Reaction::Consume);
///         }
///         Ok(Reaction::Forward)
///     }
/// }
/// ```
pub trait StateBehavior<S: StateId, K: Signal>: Send {
    /// Runs first on entry; the place to require resources.
    fn on_initialize(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after `on_initialize`, before child regions are constructed.
    fn on_entry(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after child regions are destroyed.
    fn on_exit(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        let _ = ctx;
        Ok(())
    }

    /// Offered every event while the state is active, before its
    /// transition table is consulted. `Forward` defers to the table and
    /// then to the enclosing states.
    fn react(
        &mut self,
        event: &Event<K>,
        ctx: &mut StateContext<'_, S, K>,
    ) -> Result<Reaction<S>, StateError> {
        let _ = (event, ctx);
        Ok(Reaction::Forward)
    }
}

/// Behavior of states declared without one: forwards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passive;

impl<S: StateId, K: Signal> StateBehavior<S, K> for Passive {}
