//! Broadcast hub - fans envelopes out to every live alert subscriber
//!
//! Each subscriber owns a bounded outbound queue drained by its own writer
//! task, so a slow connection never holds up the others. The subscriber map
//! is only locked to snapshot or mutate membership, never across a send.
//! There is no history: a subscriber sees only envelopes broadcast while it
//! is registered.

use crate::envelope::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub type SubscriberId = u64;

/// Receiving half handed to a connection once its handshake has completed
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<Envelope>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued envelope; `None` once the hub has dropped this subscriber
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Envelope>> {
        self.receiver.try_recv().ok()
    }
}

pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<Envelope>>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Arc<Envelope>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber. Call only after the connection is fully open.
    pub fn connect(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };

        debug!(subscriber = id, subscribers = count, "subscriber connected");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn disconnect(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "subscriber disconnected");
        } else {
            debug!(subscriber = id, "disconnect for unknown subscriber ignored");
        }
        removed
    }

    /// Queue `envelope` for every current subscriber.
    ///
    /// Subscribers whose queue is closed are removed. A full queue drops this
    /// envelope for that subscriber only. Returns how many subscribers the
    /// envelope was queued for.
    pub fn broadcast(&self, envelope: Envelope) -> usize {
        let envelope = Arc::new(envelope);
        let targets: Vec<(SubscriberId, mpsc::Sender<Arc<Envelope>>)> = self
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, sender) in targets {
            match sender.try_send(Arc::clone(&envelope)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, "subscriber queue full, dropping envelope");
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.lock();
            for id in &dead {
                subscribers.remove(id);
            }
            warn!(removed = ?dead, "dropped subscribers with closed connections");
        }

        debug!(
            kind = envelope.modality().as_str(),
            delivered, "broadcast envelope"
        );
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SUBSCRIBER_QUEUE_CAPACITY)
    }
}
