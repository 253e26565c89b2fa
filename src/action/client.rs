//! Adapter turning one external request/response interaction into events.

use super::error::ActionError;
use super::retry::{RetryDecision, RetryPolicy};
use super::server::{ActionServer, GoalHandle};
use crate::core::{ActionOutcome, ClientId, Event, EventKind, Origin, RequestId, Signal};
use crate::registry::{Resource, ResourceScope};
use crate::runtime::EventSender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Callback<R> = Arc<dyn Fn(ActionOutcome, &R) + Send + Sync>;

struct Subscription<R> {
    outcome: Option<ActionOutcome>,
    callback: Callback<R>,
}

/// Subscriber list and latest request, shared with the goal handles.
///
/// Completions read both when they arrive, so callbacks registered after
/// `send_goal` still run and completions of superseded or cancelled
/// requests run none.
struct Shared<R> {
    subscriptions: Vec<Subscription<R>>,
    latest: Option<RequestId>,
}

impl<R> Shared<R> {
    fn callbacks_for(&self, request: RequestId, outcome: ActionOutcome) -> Vec<Callback<R>> {
        if self.latest != Some(request) {
            return Vec::new();
        }
        self.subscriptions
            .iter()
            .filter(|s| s.outcome.map_or(true, |o| o == outcome))
            .map(|s| Arc::clone(&s.callback))
            .collect()
    }
}

fn lock<R>(shared: &Mutex<Shared<R>>) -> MutexGuard<'_, Shared<R>> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Client side of one action kind, owned by a region.
///
/// On completion the adapter first runs the locally registered callbacks
/// (on the completing thread, only for the latest request), then posts
/// exactly one outcome event
/// `EventKind::Action { client, region, outcome }` into the machine queue.
/// Feedback is posted as `EventKind::Feedback { client, region }`.
///
/// Dropping the adapter cancels the goal it still has in flight.
pub struct ActionClient<A: ActionServer, K: Signal> {
    name: String,
    region: String,
    id: ClientId,
    server: Arc<A>,
    sender: EventSender<K>,
    connect_timeout: Duration,
    retry: RetryPolicy,
    shared: Arc<Mutex<Shared<A::Result>>>,
    current: Option<RequestId>,
    in_flight: bool,
    last_goal: Option<A::Goal>,
    attempts: usize,
}

impl<A: ActionServer, K: Signal> ActionClient<A, K> {
    /// Create a client named `name` talking to `server`, owned by the
    /// region described by `scope`.
    pub fn new(name: impl Into<String>, server: Arc<A>, scope: &ResourceScope<K>) -> Self {
        Self {
            name: name.into(),
            region: scope.region().to_string(),
            id: ClientId::new(),
            server,
            sender: scope.sender().clone(),
            connect_timeout: scope.connect_timeout(),
            retry: scope.retry_policy().clone(),
            shared: Arc::new(Mutex::new(Shared {
                subscriptions: Vec::new(),
                latest: None,
            })),
            current: None,
            in_flight: false,
            last_goal: None,
            attempts: 0,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry = policy;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag of the owning region.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Request id of the most recent dispatch.
    pub fn current_request(&self) -> Option<RequestId> {
        self.current
    }

    /// Whether a dispatched goal has not yet reported back to the machine.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Dispatches made for the current goal, resubmissions included.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Kind of the outcome events this client posts.
    pub fn outcome_kind(&self, outcome: ActionOutcome) -> EventKind<K> {
        EventKind::action(self.name.clone(), self.region.clone(), outcome)
    }

    /// Run `callback` on every outcome of the latest request, before the
    /// event is posted. Applies to goals already in flight.
    pub fn on_result<F>(&mut self, callback: F)
    where
        F: Fn(ActionOutcome, &A::Result) + Send + Sync + 'static,
    {
        lock(&self.shared).subscriptions.push(Subscription {
            outcome: None,
            callback: Arc::new(callback),
        });
    }

    /// Run `callback` when a request finishes with `outcome`.
    pub fn on_outcome<F>(&mut self, outcome: ActionOutcome, callback: F)
    where
        F: Fn(&A::Result) + Send + Sync + 'static,
    {
        lock(&self.shared).subscriptions.push(Subscription {
            outcome: Some(outcome),
            callback: Arc::new(move |_, result| callback(result)),
        });
    }

    pub fn on_succeeded<F>(&mut self, callback: F)
    where
        F: Fn(&A::Result) + Send + Sync + 'static,
    {
        self.on_outcome(ActionOutcome::Succeeded, callback)
    }

    pub fn on_aborted<F>(&mut self, callback: F)
    where
        F: Fn(&A::Result) + Send + Sync + 'static,
    {
        self.on_outcome(ActionOutcome::Aborted, callback)
    }

    pub fn on_preempted<F>(&mut self, callback: F)
    where
        F: Fn(&A::Result) + Send + Sync + 'static,
    {
        self.on_outcome(ActionOutcome::Preempted, callback)
    }

    pub fn on_rejected<F>(&mut self, callback: F)
    where
        F: Fn(&A::Result) + Send + Sync + 'static,
    {
        self.on_outcome(ActionOutcome::Rejected, callback)
    }

    /// Dispatch a new goal, handshaking with the server first if needed.
    ///
    /// Starts a fresh attempt count; any goal still in flight is superseded
    /// and its late outcome will be discarded as stale.
    pub fn send_goal(&mut self, goal: A::Goal) -> Result<RequestId, ActionError> {
        self.attempts = 0;
        self.dispatch(goal)
    }

    /// What the retry policy says about resubmitting the last goal.
    pub fn next_retry(&self) -> Result<RetryDecision, ActionError> {
        if self.last_goal.is_none() {
            return Err(ActionError::NoGoal {
                client: self.name.clone(),
            });
        }
        Ok(self.retry.check(self.attempts)?)
    }

    /// Resubmit the last goal now, if the retry policy allows another
    /// attempt. Callers honouring a backoff wait for
    /// [`next_retry`](Self::next_retry)'s delay before calling this.
    pub fn retry(&mut self) -> Result<RetryDecision, ActionError> {
        let decision = self.next_retry()?;
        let goal = self.last_goal.clone().ok_or_else(|| ActionError::NoGoal {
            client: self.name.clone(),
        })?;
        tracing::info!(
            client = %self.name,
            attempt = decision.attempt,
            "resubmitting goal"
        );
        self.dispatch(goal)?;
        Ok(decision)
    }

    /// Cancel the goal in flight, if any.
    pub fn cancel(&mut self) {
        if let (true, Some(request)) = (self.in_flight, self.current) {
            tracing::info!(client = %self.name, %request, "cancelling goal");
            self.server.cancel_goal(request);
            self.in_flight = false;
            lock(&self.shared).latest = None;
        }
    }

    fn dispatch(&mut self, goal: A::Goal) -> Result<RequestId, ActionError> {
        if !self.server.is_connected() {
            tracing::info!(
                client = %self.name,
                region = %self.region,
                "not connected with action server, waiting"
            );
            if !self.server.wait_for_server(self.connect_timeout) {
                return Err(ActionError::ServerUnavailable {
                    client: self.name.clone(),
                    timeout: self.connect_timeout,
                });
            }
        }

        let request = RequestId::new();
        let handle = self.goal_handle(request);
        self.current = Some(request);
        lock(&self.shared).latest = Some(request);
        self.in_flight = true;
        self.attempts += 1;
        self.last_goal = Some(goal.clone());

        tracing::info!(client = %self.name, %request, ?goal, "sending goal");
        self.server.send_goal(goal, handle);
        Ok(request)
    }

    fn goal_handle(&self, request: RequestId) -> GoalHandle<A::Result, A::Feedback> {
        let origin = Origin {
            client: self.id,
            request: Some(request),
        };

        let shared = Arc::clone(&self.shared);
        let sender = self.sender.clone();
        let client = self.name.clone();
        let region = self.region.clone();
        let on_complete = Box::new(move |outcome: ActionOutcome, result: A::Result| {
            // The lock is not held while callbacks run.
            let callbacks = lock(&shared).callbacks_for(request, outcome);
            for callback in callbacks {
                callback(outcome, &result);
            }
            tracing::info!(client = %client, %request, %outcome, "request result");
            let event = Event::new(EventKind::action(client, region, outcome))
                .with_tag(outcome.tag())
                .with_origin(origin)
                .with_payload(result);
            if sender.post(event).is_err() {
                tracing::debug!(%request, "machine gone, outcome not delivered");
            }
        });

        let sender = self.sender.clone();
        let client = self.name.clone();
        let region = self.region.clone();
        let on_feedback = Arc::new(move |feedback: A::Feedback| {
            let event = Event::new(EventKind::feedback(client.clone(), region.clone()))
                .with_origin(origin)
                .with_payload(feedback);
            let _ = sender.post(event);
        });

        GoalHandle::new(request, on_complete, on_feedback)
    }
}

impl<A: ActionServer, K: Signal> Resource for ActionClient<A, K> {
    fn client_id(&self) -> Option<ClientId> {
        Some(self.id)
    }

    fn admit(&mut self, origin: &Origin, terminal: bool) -> bool {
        if origin.request != self.current {
            return false;
        }
        if terminal {
            self.in_flight = false;
        }
        true
    }
}

impl<A: ActionServer, K: Signal> Drop for ActionClient<A, K> {
    fn drop(&mut self) {
        if self.in_flight {
            tracing::warn!(client = %self.name, "client released with goal in flight");
        }
        self.cancel();
    }
}

impl<A: ActionServer, K: Signal> std::fmt::Debug for ActionClient<A, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionClient")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("id", &self.id)
            .field("current", &self.current)
            .field("in_flight", &self.in_flight)
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{event_channel, EventReceiver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    enum Key {}

    #[derive(Default)]
    struct FakeServer {
        connected: bool,
        reachable: bool,
        handshakes: AtomicUsize,
        goals: Mutex<Vec<(f64, GoalHandle<String, u8>)>>,
        cancelled: Mutex<Vec<RequestId>>,
    }

    impl ActionServer for FakeServer {
        type Goal = f64;
        type Result = String;
        type Feedback = u8;

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn wait_for_server(&self, _timeout: Duration) -> bool {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            self.reachable
        }

        fn send_goal(&self, goal: f64, handle: GoalHandle<String, u8>) {
            self.goals.lock().unwrap().push((goal, handle));
        }

        fn cancel_goal(&self, request: RequestId) {
            self.cancelled.lock().unwrap().push(request);
        }
    }

    impl FakeServer {
        fn connected() -> Arc<Self> {
            Arc::new(Self {
                connected: true,
                ..Self::default()
            })
        }

        fn take_handle(&self) -> GoalHandle<String, u8> {
            self.goals.lock().unwrap().remove(0).1
        }
    }

    fn client(server: Arc<FakeServer>) -> (ActionClient<FakeServer, Key>, EventReceiver<Key>) {
        let (sender, receiver) = event_channel();
        let scope = ResourceScope::new(
            "navigation",
            sender,
            Duration::from_millis(10),
            RetryPolicy::new(),
        );
        (ActionClient::new("move_base", server, &scope), receiver)
    }

    #[test]
    fn completion_posts_exactly_one_outcome_event() {
        let server = FakeServer::connected();
        let (mut client, mut receiver) = client(Arc::clone(&server));

        let request = client.send_goal(1.0).unwrap();
        server
            .take_handle()
            .complete(ActionOutcome::Succeeded, "done".to_string());

        let event = receiver.try_next().expect("outcome event queued");
        assert_eq!(
            event.kind(),
            &EventKind::succeeded("move_base", "navigation")
        );
        assert_eq!(event.payload::<String>().map(String::as_str), Some("done"));
        assert_eq!(event.origin().unwrap().request, Some(request));
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn callbacks_run_before_event_is_posted() {
        let server = FakeServer::connected();
        let (mut client, receiver) = client(Arc::clone(&server));
        let receiver = Arc::new(Mutex::new(receiver));
        let queued_during_callback = Arc::new(Mutex::new(None));

        let queue = Arc::clone(&receiver);
        let seen = Arc::clone(&queued_during_callback);
        client.on_succeeded(move |_result| {
            *seen.lock().unwrap() = Some(queue.lock().unwrap().len());
        });

        client.send_goal(2.0).unwrap();
        server
            .take_handle()
            .complete(ActionOutcome::Succeeded, String::new());

        assert_eq!(*queued_during_callback.lock().unwrap(), Some(0));
        assert_eq!(receiver.lock().unwrap().len(), 1);
    }

    #[test]
    fn filtered_callbacks_only_fire_for_their_outcome() {
        let server = FakeServer::connected();
        let (mut client, _receiver) = client(Arc::clone(&server));
        let aborted = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&aborted);
        client.on_aborted(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&any);
        client.on_result(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.send_goal(1.0).unwrap();
        server
            .take_handle()
            .complete(ActionOutcome::Succeeded, String::new());

        assert_eq!(aborted.load(Ordering::SeqCst), 0);
        assert_eq!(any.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_registered_after_sending_still_fire() {
        let server = FakeServer::connected();
        let (mut client, _receiver) = client(Arc::clone(&server));
        let fired = Arc::new(AtomicUsize::new(0));

        client.send_goal(1.0).unwrap();
        let counter = Arc::clone(&fired);
        client.on_succeeded(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        server
            .take_handle()
            .complete(ActionOutcome::Succeeded, String::new());

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn superseded_and_cancelled_requests_run_no_callbacks() {
        let server = FakeServer::connected();
        let (mut client, mut receiver) = client(Arc::clone(&server));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        client.on_result(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.send_goal(1.0).unwrap();
        client.send_goal(2.0).unwrap();
        let superseded = server.take_handle();
        let latest = server.take_handle();
        superseded.complete(ActionOutcome::Succeeded, String::new());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        client.cancel();
        latest.complete(ActionOutcome::Preempted, String::new());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Both outcomes are still posted; routing discards them as stale.
        assert_eq!(receiver.len(), 2);
    }

    #[test]
    fn handshake_happens_only_when_disconnected() {
        let server = Arc::new(FakeServer {
            connected: false,
            reachable: true,
            ..FakeServer::default()
        });
        let (mut client, _receiver) = client(Arc::clone(&server));
        client.send_goal(1.0).unwrap();
        assert_eq!(server.handshakes.load(Ordering::SeqCst), 1);

        let connected = FakeServer::connected();
        let (mut client, _receiver) = self::client(Arc::clone(&connected));
        client.send_goal(1.0).unwrap();
        assert_eq!(connected.handshakes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unreachable_server_fails_the_send() {
        let server = Arc::new(FakeServer::default());
        let (mut client, _receiver) = client(server);
        let err = client.send_goal(1.0).unwrap_err();
        assert!(matches!(err, ActionError::ServerUnavailable { .. }));
        assert!(!client.is_busy());
    }

    #[test]
    fn retry_respects_ceiling() {
        let server = FakeServer::connected();
        let (client, _receiver) = client(Arc::clone(&server));
        let mut client = client.with_retry_policy(RetryPolicy::new().max_attempts(2));

        assert!(matches!(client.retry(), Err(ActionError::NoGoal { .. })));

        client.send_goal(3.0).unwrap();
        assert_eq!(client.retry().unwrap().attempt, 2);
        assert_eq!(client.attempts(), 2);
        assert!(matches!(client.retry(), Err(ActionError::Retry(_))));

        let goals: Vec<f64> = server.goals.lock().unwrap().iter().map(|(g, _)| *g).collect();
        assert_eq!(goals, vec![3.0, 3.0]);
    }

    #[test]
    fn stale_requests_are_not_admitted() {
        let server = FakeServer::connected();
        let (mut client, _receiver) = client(server);
        let first = client.send_goal(1.0).unwrap();
        let second = client.send_goal(2.0).unwrap();

        let stale = Origin {
            client: client.id(),
            request: Some(first),
        };
        let current = Origin {
            client: client.id(),
            request: Some(second),
        };
        assert!(!client.admit(&stale, true));
        assert!(client.is_busy());
        assert!(client.admit(&current, true));
        assert!(!client.is_busy());
    }

    #[test]
    fn dropping_busy_client_cancels_goal() {
        let server = FakeServer::connected();
        let (mut client, _receiver) = client(Arc::clone(&server));
        let request = client.send_goal(1.0).unwrap();
        drop(client);
        assert_eq!(*server.cancelled.lock().unwrap(), vec![request]);
    }

    #[test]
    fn dropping_idle_client_cancels_nothing() {
        let server = FakeServer::connected();
        let (mut client, _receiver) = client(Arc::clone(&server));
        let request = client.send_goal(1.0).unwrap();
        client.admit(
            &Origin {
                client: client.id(),
                request: Some(request),
            },
            true,
        );
        drop(client);
        assert!(server.cancelled.lock().unwrap().is_empty());
    }

    #[test]
    fn feedback_is_posted_separately() {
        let server = FakeServer::connected();
        let (mut client, mut receiver) = client(Arc::clone(&server));
        client.send_goal(1.0).unwrap();
        let handle = server.take_handle();
        handle.feedback(40);
        handle.complete(ActionOutcome::Aborted, String::new());

        let feedback = receiver.try_next().unwrap();
        assert_eq!(feedback.kind(), &EventKind::feedback("move_base", "navigation"));
        assert_eq!(feedback.payload::<u8>(), Some(&40));
        let outcome = receiver.try_next().unwrap();
        assert_eq!(outcome.tag(), Some(&crate::core::Tag::Abort));
    }
}
