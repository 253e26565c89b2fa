//! Shared fixtures for integration tests.

#![allow(dead_code)]

use orthos::action::{ActionOutcome, ActionServer, GoalHandle};
use orthos::core::{RequestId, Signal, StateId};
use orthos::runtime::{StateBehavior, StateContext, StateError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

pub fn count(journal: &Journal, entry: &str) -> usize {
    journal.lock().unwrap().iter().filter(|e| *e == entry).count()
}

/// Behavior writing `init:X`, `entry:X` and `exit:X` to a journal.
pub struct Recorder {
    journal: Journal,
}

impl Recorder {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Arc::clone(journal),
        }
    }

    fn note<S: StateId>(&self, hook: &str, state: &S) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{hook}:{}", state.name()));
    }
}

impl<S: StateId, K: Signal> StateBehavior<S, K> for Recorder {
    fn on_initialize(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        self.note("init", ctx.state());
        Ok(())
    }

    fn on_entry(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        self.note("entry", ctx.state());
        Ok(())
    }

    fn on_exit(&mut self, ctx: &mut StateContext<'_, S, K>) -> Result<(), StateError> {
        self.note("exit", ctx.state());
        Ok(())
    }
}

/// Action server completing goals only when the test says so.
pub struct FakeServer {
    connected: AtomicBool,
    reachable: bool,
    handshakes: AtomicUsize,
    pending: Mutex<Vec<GoalHandle<String, u32>>>,
    goals: Mutex<Vec<f64>>,
    cancelled: Mutex<Vec<RequestId>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            reachable: true,
            handshakes: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
            goals: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            reachable: false,
            handshakes: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
            goals: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    /// Complete the oldest pending goal. False if none is pending.
    pub fn complete_next(&self, outcome: ActionOutcome, result: &str) -> bool {
        let handle = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        handle.complete(outcome, result.to_string());
        true
    }

    /// Report feedback on the oldest pending goal.
    pub fn feedback(&self, progress: u32) {
        if let Some(handle) = self.pending.lock().unwrap().first() {
            handle.feedback(progress);
        }
    }

    /// Take the oldest pending goal without completing it.
    pub fn take_next(&self) -> Option<GoalHandle<String, u32>> {
        let mut pending = self.pending.lock().unwrap();
        (!pending.is_empty()).then(|| pending.remove(0))
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn goals(&self) -> Vec<f64> {
        self.goals.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<RequestId> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }
}

impl ActionServer for FakeServer {
    type Goal = f64;
    type Result = String;
    type Feedback = u32;

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn wait_for_server(&self, _timeout: Duration) -> bool {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        if self.reachable {
            self.connected.store(true, Ordering::SeqCst);
        }
        self.reachable
    }

    fn send_goal(&self, goal: f64, handle: GoalHandle<String, u32>) {
        self.goals.lock().unwrap().push(goal);
        self.pending.lock().unwrap().push(handle);
    }

    fn cancel_goal(&self, request: RequestId) {
        self.cancelled.lock().unwrap().push(request);
        self.pending
            .lock()
            .unwrap()
            .retain(|handle| handle.request() != request);
    }
}
