//! Event fan-in channel.
//!
//! Bounded, many producers, one consumer. Producers wait for capacity instead
//! of dropping events. The channel reports closed to the consumer only after
//! every `EventSink` clone has been dropped, i.e. after every producer task
//! has exited.

use std::num::NonZeroUsize;

use tokio::sync::mpsc;

use crate::event::ChangeEvent;

/// Default capacity of the fan-in channel.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Creates the fan-in channel.
pub fn fan_in(capacity: NonZeroUsize) -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.get());
    (EventSink { tx }, EventReceiver { rx })
}

/// Producer side. Cloned once per watch task.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ChangeEvent>,
}

/// The consumer is gone; the event was not delivered.
#[derive(Debug, thiserror::Error)]
#[error("event channel closed by the consumer")]
pub struct SinkClosed(pub ChangeEvent);

impl EventSink {
    /// Sends an event, waiting while the channel is full.
    pub async fn send(&self, event: ChangeEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|err| SinkClosed(err.0))
    }

    /// Whether the consumer dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<ChangeEvent>,
}

impl EventReceiver {
    /// Next event; `None` once every producer has exited.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for tests and draining.
    pub fn try_recv(&mut self) -> Result<ChangeEvent, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Events currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True when no event is buffered.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
