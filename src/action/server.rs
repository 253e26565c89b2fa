//! Boundary to the external request/response endpoint.
//!
//! Implementations wrap whatever actually executes the request (a
//! middleware action server, a motion controller, a test double). They run
//! on their own threads and report back exclusively through the
//! [`GoalHandle`] they were given.

use crate::core::{ActionOutcome, RequestId};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// An external endpoint accepting goals of one action kind.
pub trait ActionServer: Send + Sync + 'static {
    type Goal: Clone + Debug + Send + 'static;
    type Result: Send + 'static;
    type Feedback: Send + 'static;

    /// Whether a connection to the endpoint is currently established.
    fn is_connected(&self) -> bool;

    /// Block until connected or `timeout` elapses; true if connected.
    fn wait_for_server(&self, timeout: Duration) -> bool;

    /// Start executing `goal`. Must not block on the goal's completion;
    /// the outcome is reported later through `handle`.
    fn send_goal(&self, goal: Self::Goal, handle: GoalHandle<Self::Result, Self::Feedback>);

    /// Ask the endpoint to stop working on `request`.
    fn cancel_goal(&self, request: RequestId);
}

type CompleteFn<R> = Box<dyn FnOnce(ActionOutcome, R) + Send>;
type FeedbackFn<F> = Arc<dyn Fn(F) + Send + Sync>;

/// Reporting channel for one dispatched goal.
///
/// `complete` consumes the handle, so a goal can produce at most one
/// outcome event. Dropping the handle without completing reports nothing.
pub struct GoalHandle<R, F> {
    request: RequestId,
    on_complete: CompleteFn<R>,
    on_feedback: FeedbackFn<F>,
}

impl<R, F> GoalHandle<R, F> {
    pub(crate) fn new(
        request: RequestId,
        on_complete: CompleteFn<R>,
        on_feedback: FeedbackFn<F>,
    ) -> Self {
        Self {
            request,
            on_complete,
            on_feedback,
        }
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    /// Report progress. Best effort: feedback may be dropped and carries
    /// no ordering guarantee relative to the outcome.
    pub fn feedback(&self, feedback: F) {
        (self.on_feedback)(feedback)
    }

    /// Report the terminal outcome.
    pub fn complete(self, outcome: ActionOutcome, result: R) {
        (self.on_complete)(outcome, result)
    }
}

impl<R, F> std::fmt::Debug for GoalHandle<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalHandle")
            .field("request", &self.request)
            .finish()
    }
}
