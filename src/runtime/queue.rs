//! The machine's single FIFO event queue.

use crate::core::{Event, Signal};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// The machine that owned the queue is gone.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Machine event queue is closed")]
pub struct QueueClosed;

pub(crate) enum QueueItem<K> {
    Event(Event<K>),
    Stop,
}

/// Cloneable handle for posting events from any thread.
///
/// Events posted through one sender are processed in posting order, after
/// everything already queued.
pub struct EventSender<K> {
    tx: mpsc::UnboundedSender<QueueItem<K>>,
}

impl<K> Clone for EventSender<K> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<K> fmt::Debug for EventSender<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<K: Signal> EventSender<K> {
    pub fn post(&self, event: Event<K>) -> Result<(), QueueClosed> {
        self.tx.send(QueueItem::Event(event)).map_err(|_| QueueClosed)
    }

    /// Shorthand for posting `Event::signal(signal)`.
    pub fn signal(&self, signal: K) -> Result<(), QueueClosed> {
        self.post(Event::signal(signal))
    }

    /// Ask a machine driven by `Machine::run` to shut down once the events
    /// queued before this request have been processed.
    pub fn stop(&self) -> Result<(), QueueClosed> {
        self.tx.send(QueueItem::Stop).map_err(|_| QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end, owned by the machine.
pub struct EventReceiver<K> {
    rx: mpsc::UnboundedReceiver<QueueItem<K>>,
}

impl<K> EventReceiver<K> {
    pub(crate) fn try_recv(&mut self) -> Option<QueueItem<K>> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub(crate) async fn recv(&mut self) -> Option<QueueItem<K>> {
        self.rx.recv().await
    }

    /// Items waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<Event<K>> {
        loop {
            match self.try_recv()? {
                QueueItem::Event(event) => return Some(event),
                QueueItem::Stop => continue,
            }
        }
    }
}

pub(crate) fn event_channel<K>() -> (EventSender<K>, EventReceiver<K>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
