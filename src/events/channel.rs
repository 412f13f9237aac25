//! Event channel built on crossbeam-channel.
//!
//! The core sends; a front end (CLI progress bar, JSON log, tests) receives.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Sending half handed to the pipeline and worker threads.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Send an event. A dropped receiver discards it, so reporting stays
    /// optional for callers.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half used by the front end.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, or `None` once all senders are gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructor for sender/receiver pairs.
pub struct EventChannel;

impl EventChannel {
    /// Unbounded channel; events are small.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        EventChannel
    }
}

/// A sender nobody listens to. Used by `Pipeline::run` and tests.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}
