//! # Rewind
//!
//! An in-memory key/value store with time travel: named snapshots of the
//! whole state, restore to any snapshot, and key-level diffs between
//! snapshots, all recorded in an append-only operation log.
//!
//! ## Core Concepts
//!
//! - **State**: The live key/value mapping, mutated by writes, deletes and clears
//! - **Snapshots**: Immutable copies of the whole state, archived forever
//! - **Restore**: Replace state with a snapshot, after archiving an automatic backup
//! - **Operation log**: Append-only history of every change
//! - **Subscriptions**: Callbacks and channels notified after each change
//!
//! ## Example
//!
//! ```ignore
//! use rewind::{Store, StoreConfig};
//!
//! let store = Store::new(StoreConfig::empty())?;
//!
//! store.write("a", "1")?;
//! let before = store.create_snapshot("before", None)?;
//!
//! store.write("a", "99")?;
//! let after = store.create_snapshot("after", Some("bumped a"))?;
//!
//! let diff = store.diff_snapshots(after, before)?;
//! assert_eq!(diff.modified, vec!["a"]);
//!
//! // Archives the current state, then goes back.
//! store.restore_snapshot(before)?;
//! assert_eq!(store.read("a").as_deref(), Some("1"));
//! ```

pub mod clock;
pub mod error;
pub mod records;
pub mod seed;
pub mod snapshots;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, StoreError};
pub use records::{OperationIndex, OperationLog};
pub use snapshots::{diff, diff_entries, SnapshotArchive, SnapshotDiff};
pub use state::{apply_operation, copy_entries, replay, StateTable};
pub use store::{
    corruption_draws, is_corrupted_value, CorruptionReport, RestoreReceipt, SeedData, Store,
    StoreConfig, CORRUPTION_PREFIX, PRE_CORRUPTION_SNAPSHOT_NAME,
};
pub use subscriptions::{
    DropReason, ListenerHandle, ListenerId, StoreEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
