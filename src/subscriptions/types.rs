//! Subscription types for live store updates.

use crate::types::{Sequence, SnapshotId};
use serde::{Deserialize, Serialize};
use std::sync::Weak;

use super::manager::SubscriptionManager;

/// Configuration for a channel subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for channel subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only report writes and deletes of these keys (None = all keys).
    /// Clears and restores touch every key and always pass.
    pub keys: Option<Vec<String>>,

    /// Include write, delete, clear and restore events.
    pub include_data: bool,

    /// Include snapshot creation events.
    pub include_snapshots: bool,
}

impl SubscriptionFilter {
    /// Subscribe to every data change.
    pub fn data() -> Self {
        Self {
            include_data: true,
            ..Default::default()
        }
    }

    /// Subscribe to changes of specific keys.
    pub fn keys(keys: Vec<String>) -> Self {
        Self {
            keys: Some(keys),
            include_data: true,
            ..Default::default()
        }
    }

    /// Subscribe to snapshot creation.
    pub fn snapshots() -> Self {
        Self {
            include_snapshots: true,
            ..Default::default()
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            include_data: true,
            include_snapshots: true,
            ..Default::default()
        }
    }

    /// Check if an event passes this filter.
    pub fn matches(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::Written { key, .. } | StoreEvent::Deleted { key, .. } => {
                self.include_data
                    && self
                        .keys
                        .as_ref()
                        .map_or(true, |keys| keys.iter().any(|k| k == key))
            }
            StoreEvent::Cleared { .. } | StoreEvent::Restored { .. } => self.include_data,
            StoreEvent::SnapshotCreated { .. } => self.include_snapshots,
            StoreEvent::Dropped { .. } => true,
        }
    }
}

/// Events emitted after a committed change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    // --- Data Events ---
    /// A key was written.
    Written { key: String, sequence: Sequence },

    /// An existing key was deleted.
    Deleted { key: String, sequence: Sequence },

    /// All keys were removed.
    Cleared { sequence: Sequence },

    /// State was replaced by a snapshot's data.
    Restored {
        snapshot_id: SnapshotId,
        /// Automatic snapshot of the state that was replaced.
        backup_id: SnapshotId,
        sequence: Sequence,
    },

    // --- Archive Events ---
    /// A snapshot was archived.
    SnapshotCreated {
        id: SnapshotId,
        name: String,
        sequence: Sequence,
    },

    // --- Lifecycle Events ---
    /// Channel subscription was dropped.
    Dropped { reason: DropReason },
}

impl StoreEvent {
    /// Log position of the operation behind this event.
    pub fn sequence(&self) -> Option<Sequence> {
        match self {
            StoreEvent::Written { sequence, .. }
            | StoreEvent::Deleted { sequence, .. }
            | StoreEvent::Cleared { sequence }
            | StoreEvent::Restored { sequence, .. }
            | StoreEvent::SnapshotCreated { sequence, .. } => Some(*sequence),
            StoreEvent::Dropped { .. } => None,
        }
    }
}

/// Why a channel subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a channel subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Unique identifier for a callback listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle to a channel subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Deregisters a callback listener.
///
/// Dropping the handle leaves the listener registered.
#[derive(Clone, Debug)]
pub struct ListenerHandle {
    pub id: ListenerId,
    pub(crate) manager: Weak<SubscriptionManager>,
}

impl ListenerHandle {
    /// Remove the listener. Returns whether it was still registered, so a
    /// second call is a harmless `false`.
    pub fn unsubscribe(&self) -> bool {
        match self.manager.upgrade() {
            Some(manager) => manager.remove_listener(self.id),
            None => false,
        }
    }
}
