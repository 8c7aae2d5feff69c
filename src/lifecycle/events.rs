//! Control events and the single intake path feeding the dispatch loop.
//!
//! Every event source (OS signals, the config watcher, tests) holds an
//! [`EventSender`]; the controller owns the one [`EventReceiver`].
//!
//! Every event travels through one bounded queue and is handled in arrival
//! order. When the queue is full, Reload and DumpState are dropped with a
//! warning. Shutdown is latched in a separate watch flag instead, so it is
//! always deliverable; the receiver still hands out the events that were
//! queued ahead of it before reporting the shutdown.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// Capacity of the control event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// An abstract trigger for a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    /// Re-resolve configuration and replace the running server.
    Reload,
    /// Stop and purge the server, then exit.
    Shutdown,
    /// Write a snapshot of the running server's state.
    DumpState,
}

impl ControlEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlEvent::Reload => "reload",
            ControlEvent::Shutdown => "shutdown",
            ControlEvent::DumpState => "dump-state",
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of handing an event to the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The event will reach the dispatch loop.
    Queued,
    /// The queue was full; the event was coalesced away.
    Dropped,
    /// The dispatch loop is gone.
    Closed,
}

/// Create a connected sender/receiver pair.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (queue_tx, queue_rx) = mpsc::channel(capacity.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sender = EventSender {
        queue: queue_tx,
        shutdown: Arc::new(shutdown_tx),
    };
    let receiver = EventReceiver {
        queue: queue_rx,
        shutdown: shutdown_rx,
        shutdown_closed: false,
        backlog: None,
    };
    (sender, receiver)
}

/// Cloneable handle for raising control events.
#[derive(Debug, Clone)]
pub struct EventSender {
    queue: mpsc::Sender<ControlEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl EventSender {
    /// Raise an event without blocking.
    pub fn send(&self, event: ControlEvent) -> Delivery {
        match self.queue.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(ControlEvent::Shutdown)) => {
                tracing::warn!("Control event queue full, latching shutdown");
                self.shutdown.send_replace(true);
                Delivery::Queued
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(event = %event, "Control event queue full, dropping event");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Whether the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// The single ordered intake consumed by the lifecycle controller.
#[derive(Debug)]
pub struct EventReceiver {
    queue: mpsc::Receiver<ControlEvent>,
    shutdown: watch::Receiver<bool>,
    shutdown_closed: bool,
    /// Queued events still owed before a latched shutdown.
    backlog: Option<usize>,
}

impl EventReceiver {
    /// Wait for the next event.
    ///
    /// Once a latched shutdown is seen, the events already queued at that
    /// point are returned first, then Shutdown on every call. Returns `None`
    /// once every sender has been dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<ControlEvent> {
        loop {
            if let Some(backlog) = &mut self.backlog {
                if *backlog > 0 {
                    *backlog -= 1;
                    if let Ok(event) = self.queue.try_recv() {
                        return Some(event);
                    }
                    *backlog = 0;
                }
                return Some(ControlEvent::Shutdown);
            }
            if *self.shutdown.borrow_and_update() {
                self.backlog = Some(self.queue.len());
                continue;
            }
            if self.shutdown_closed {
                return self.queue.recv().await;
            }

            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        self.shutdown_closed = true;
                    }
                }
                event = self.queue.recv() => return event,
            }
        }
    }
}
