//! Change notification for live store updates.
//!
//! Two ways to observe the store:
//! - Callback listeners, invoked in registration order after every
//!   committed change. A listener may read from or write to the store.
//! - Channel subscriptions with a bounded buffer and a filter. Slow
//!   subscribers whose buffer fills up are dropped.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(|event| println!("changed: {:?}", event));
//! store.write("greeting", "hello")?;
//! handle.unsubscribe();
//!
//! let channel = store.subscribe_channel(SubscriptionFilter::snapshots());
//! store.create_snapshot("checkpoint", None)?;
//! match channel.recv() {
//!     Ok(StoreEvent::SnapshotCreated { id, .. }) => println!("archived {}", id),
//!     _ => {}
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, ListenerHandle, ListenerId, StoreEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
