//! Mixer lifecycle events
//!
//! Events are broadcast over a bounded crossbeam channel. Publishing never
//! blocks the mix loop: when nobody drains the bus and it fills up, further
//! events are dropped.

use std::path::PathBuf;

use crossbeam::channel::{Receiver, Sender, TrySendError};

use crate::error::MixError;
use crate::mixer::MixSummary;

/// Events emitted by a [`Mixer`](crate::Mixer)
#[derive(Debug, Clone, PartialEq)]
pub enum MixEvent {
    /// A source was opened and its threads started
    SourceAdded { index: usize, label: String },

    /// A source stopped with an error during the mix
    SourceFailed {
        index: usize,
        label: String,
        error: MixError,
    },

    /// The output was opened and the mix loop is running
    MixStarted { output: PathBuf, sources: usize },

    /// The mix loop ended cleanly and the output was finalized
    MixFinished { output: PathBuf, summary: MixSummary },

    /// The mix loop ended with an error (the output was still finalized)
    MixFailed { output: PathBuf, error: MixError },
}

/// Broadcast channel for [`MixEvent`]s
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<MixEvent>,
    receiver: Receiver<MixEvent>,
}

impl EventBus {
    /// Create a new event bus with bounded capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam::channel::bounded(capacity);
        Self { sender, receiver }
    }

    /// Get a receiver for subscribing to events
    pub fn subscribe(&self) -> Receiver<MixEvent> {
        self.receiver.clone()
    }

    /// Publish an event, dropping it if the bus is full
    pub fn publish(&self, event: MixEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::debug!("EventBus: full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
