//! Subscription manager for broadcasting store events.

use crossbeam_channel::{bounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{
    DropReason, ListenerHandle, ListenerId, StoreEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// A registered callback.
type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Internal channel subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<StoreEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: StoreEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Manages listeners and channel subscriptions, and delivers events to them.
///
/// Events are queued and delivered one at a time: every listener sees an
/// event before any listener sees the next one. An event published while a
/// delivery is already running (for example by a listener that writes to
/// the store) is appended to the queue and delivered by the running
/// dispatcher once the current event is done.
pub struct SubscriptionManager {
    /// Callback listeners in registration order.
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    /// Channel subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating listener and subscription IDs.
    next_id: AtomicU64,
    /// Events waiting for delivery.
    queue: Mutex<DispatchQueue>,
}

/// Pending events plus whether some thread is currently delivering them.
#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<StoreEvent>,
    dispatching: bool,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue: Mutex::new(DispatchQueue::default()),
        }
    }

    // --- Callback Listeners ---

    /// Register a callback listener.
    pub fn add_listener<F>(self: &Arc<Self>, listener: F) -> ListenerHandle
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, Arc::new(listener)));

        ListenerHandle {
            id,
            manager: Arc::downgrade(self),
        }
    }

    /// Remove a callback listener. Returns false if it was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Get listener count.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    // --- Channel Subscriptions ---

    /// Create a new channel subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Delivery ---

    /// Queue events and deliver them unless another dispatch is in progress.
    ///
    /// If a dispatch is already running, on this thread or another, the
    /// events are left for that dispatcher and this call returns at once.
    pub fn publish(&self, events: impl IntoIterator<Item = StoreEvent>) {
        {
            let mut queue = self.queue.lock();
            queue.pending.extend(events);
            if queue.dispatching || queue.pending.is_empty() {
                return;
            }
            queue.dispatching = true;
        }

        loop {
            let next = {
                let mut queue = self.queue.lock();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.dispatching = false;
                }
                next
            };

            match next {
                Some(event) => self.dispatch(&event),
                None => return,
            }
        }
    }

    /// Deliver one event to every listener, then to matching channels.
    fn dispatch(&self, event: &StoreEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(?event, "store listener panicked; continuing with remaining listeners");
            }
        }

        self.broadcast(event);
    }

    /// Send to matching channel subscriptions. Drops subscribers that fail to receive.
    fn broadcast(&self, event: &StoreEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if sub.config.filter.matches(event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    debug!(?id, "dropping slow subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
