//! Event Queue
//!
//! Unbounded multi-producer / single-consumer FIFO that carries decoded
//! transport events from the worker thread to the control thread.
//! Pushing never blocks and popping never blocks. There is no
//! backpressure: a stalled consumer lets the queue grow without limit.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// A transport lifecycle notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The WebSocket handshake completed
    Connected,
    /// One inbound text frame
    MessageReceived(String),
    /// The connection ended (local or remote); terminal
    Closed,
}

/// Why a non-blocking pop returned nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopError {
    /// Nothing queued right now
    Empty,
    /// Nothing queued and every producer is gone
    Disconnected,
}

/// Producer half. Cheap to clone; safe to move to other threads.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Enqueue an event. Returns `false` if the consumer was dropped.
    pub fn push(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer half. Owned by the control thread.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Pop the oldest event without waiting
    pub fn try_pop(&mut self) -> Result<Event, PopError> {
        self.rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => PopError::Empty,
            TryRecvError::Disconnected => PopError::Disconnected,
        })
    }
}

/// Create a connected producer/consumer pair
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
