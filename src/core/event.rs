//! Events routed by the machine.
//!
//! An event is a kind plus optional outcome tag, origin and payload. The
//! kind is what transition tables match on; the tag disambiguates rules
//! that share a kind; the origin lets the router discard results from
//! clients that no longer exist.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use uuid::Uuid;

use super::state::Signal;

/// Semantic outcome marker carried by events and transition rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Success,
    Abort,
    Preempt,
    Named(String),
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Tag::Named(name.into())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Success => f.write_str("SUCCESS"),
            Tag::Abort => f.write_str("ABORT"),
            Tag::Preempt => f.write_str("PREEMPT"),
            Tag::Named(name) => f.write_str(name),
        }
    }
}

/// Terminal classification of an external request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOutcome {
    Succeeded,
    Aborted,
    Preempted,
    Rejected,
}

impl ActionOutcome {
    /// Tag attached to the outcome event. Rejections are tagged as aborts.
    pub fn tag(self) -> Tag {
        match self {
            ActionOutcome::Succeeded => Tag::Success,
            ActionOutcome::Aborted | ActionOutcome::Rejected => Tag::Abort,
            ActionOutcome::Preempted => Tag::Preempt,
        }
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionOutcome::Succeeded => "Succeeded",
            ActionOutcome::Aborted => "Aborted",
            ActionOutcome::Preempted => "Preempted",
            ActionOutcome::Rejected => "Rejected",
        };
        f.write_str(label)
    }
}

/// Identity of a client living in some region's registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one request issued by a client (a goal, a timer activation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which client (and which of its requests) produced an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    pub client: ClientId,
    pub request: Option<RequestId>,
}

/// What a transition table matches on.
///
/// Client-produced kinds are keyed by the client name and the tag of the
/// region that owns the client, so two regions driving the same kind of
/// client can be routed independently.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind<K> {
    /// Application-defined signal.
    Signal(K),
    /// Terminal outcome of an action request.
    Action {
        client: String,
        region: String,
        outcome: ActionOutcome,
    },
    /// Progress report of an action request.
    Feedback { client: String, region: String },
    /// Tick of a timer client.
    Timer { client: String, region: String },
}

impl<K> EventKind<K> {
    pub fn action(client: impl Into<String>, region: impl Into<String>, outcome: ActionOutcome) -> Self {
        EventKind::Action {
            client: client.into(),
            region: region.into(),
            outcome,
        }
    }

    pub fn succeeded(client: impl Into<String>, region: impl Into<String>) -> Self {
        Self::action(client, region, ActionOutcome::Succeeded)
    }

    pub fn aborted(client: impl Into<String>, region: impl Into<String>) -> Self {
        Self::action(client, region, ActionOutcome::Aborted)
    }

    pub fn feedback(client: impl Into<String>, region: impl Into<String>) -> Self {
        EventKind::Feedback {
            client: client.into(),
            region: region.into(),
        }
    }

    pub fn timer(client: impl Into<String>, region: impl Into<String>) -> Self {
        EventKind::Timer {
            client: client.into(),
            region: region.into(),
        }
    }

    /// Whether an event of this kind closes the request it originates from.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Action { .. })
    }
}

/// An event travelling through the machine's queue.
///
/// The queue owns the event; it is dropped once its run-to-completion cycle
/// finishes, whether it was matched or not.
pub struct Event<K> {
    kind: EventKind<K>,
    tag: Option<Tag>,
    origin: Option<Origin>,
    payload: Option<Box<dyn Any + Send>>,
}

impl<K: Signal> Event<K> {
    pub fn new(kind: EventKind<K>) -> Self {
        Self {
            kind,
            tag: None,
            origin: None,
            payload: None,
        }
    }

    /// Shorthand for an application signal.
    pub fn signal(kind: K) -> Self {
        Self::new(EventKind::Signal(kind))
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_payload<T: Any + Send>(mut self, payload: T) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn kind(&self) -> &EventKind<K> {
        &self.kind
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Typed view of the payload; `None` if absent or of another type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// True if this event came from `client`.
    pub fn is_from(&self, client: ClientId) -> bool {
        self.origin.is_some_and(|o| o.client == client)
    }
}

impl<K: fmt::Debug> fmt::Debug for Event<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("tag", &self.tag)
            .field("origin", &self.origin)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}
