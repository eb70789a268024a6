use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default pending-event capacity of a subscriber queue.
pub const BUS_CAPACITY: usize = 1000;

/// Fan-out registry for change events.
///
/// Each subscriber owns a bounded queue. `publish` serializes the event once
/// and offers it to every queue without blocking; a full queue drops the
/// event for that subscriber only. Overflowing subscribers stay registered —
/// a client that resumes draining picks up from whatever is still queued.
pub struct EventBus {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Arc<str>>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    /// Bus with a custom per-subscriber queue capacity. `capacity` must be
    /// at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a new subscriber. The returned [`Subscription`] unsubscribes
    /// itself when dropped.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry().insert(id, tx);
        Subscription {
            bus: Arc::clone(self),
            id,
            rx,
        }
    }

    /// Serialize `event` once and offer it to every registered subscriber.
    /// Never blocks. Returns the number of queues the event was placed on.
    pub fn publish<T: Serialize>(&self, event: &T) -> Result<usize, serde_json::Error> {
        let data: Arc<str> = serde_json::to_string(event)?.into();

        // Snapshot under the lock, deliver outside it, so a slow try_send
        // can never hold up subscribe/unsubscribe.
        let targets: Vec<(u64, mpsc::Sender<Arc<str>>)> = self
            .registry()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&data)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(subscriber = id, "subscriber queue full, dropping event");
                }
                // Receiver already gone; its Drop will clean up the registry.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Ok(delivered)
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    /// Idempotent; safe to race with `publish`.
    fn remove(&self, id: u64) {
        self.registry().remove(&id);
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<Arc<str>>>> {
        self.subscribers.lock().expect("subscriber registry poisoned")
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of one subscriber queue. Events arrive in publish order
/// as serialized JSON payloads. Dropping the subscription removes it from
/// the bus exactly once.
pub struct Subscription {
    bus: Arc<EventBus>,
    id: u64,
    rx: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next queued event. Returns `None` once the subscription
    /// has been removed from the bus and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.remove(self.id);
    }
}
