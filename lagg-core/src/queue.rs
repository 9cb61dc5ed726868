//! FIFO of payloads ready for delivery to the client.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::notify::Notifier;

/// Mutex-protected FIFO that posts a wake on every push.
///
/// The reorder engine is the only producer; the aggregator's event loop is the
/// only consumer.
pub struct ReadyQueue {
    items: Mutex<VecDeque<Vec<u8>>>,
    signal: Arc<Notifier>,
}

impl ReadyQueue {
    /// Create an empty queue that signals `signal` on each push.
    pub fn new(signal: Arc<Notifier>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            signal,
        }
    }

    /// Append a payload and wake the consumer.
    pub fn push(&self, payload: Vec<u8>) {
        self.items.lock().push_back(payload);
        if let Err(e) = self.signal.notify() {
            tracing::warn!("ready queue wake failed: {e}");
        }
    }

    /// Remove the oldest payload, if any.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// The notifier signalled on push.
    pub fn signal(&self) -> &Arc<Notifier> {
        &self.signal
    }
}
