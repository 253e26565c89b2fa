//! What a resource factory gets to see while constructing a resource.

use crate::action::RetryPolicy;
use crate::core::Signal;
use crate::runtime::EventSender;
use std::time::Duration;

/// Construction context handed to resource factories.
///
/// Carries the tag of the region that will own the resource and a sender
/// into the machine's queue, which is all a client needs to turn external
/// completions into routable events.
#[derive(Clone, Debug)]
pub struct ResourceScope<K: Signal> {
    region: String,
    sender: EventSender<K>,
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl<K: Signal> ResourceScope<K> {
    pub(crate) fn new(
        region: impl Into<String>,
        sender: EventSender<K>,
        connect_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            region: region.into(),
            sender,
            connect_timeout,
            retry,
        }
    }

    /// Tag of the owning region.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn sender(&self) -> &EventSender<K> {
        &self.sender
    }

    /// Bound on the blocking handshake performed by action clients.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Retry policy action clients start with.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}
