//! Snapshot archive and snapshot comparison.
//!
//! The archive is append-only: snapshots are assigned increasing ids, are
//! never removed, and are shared immutably. Diffs compare the data of two
//! snapshots by key and value.

mod archive;
mod diff;

pub use archive::SnapshotArchive;
pub(crate) use diff::diff_archived;
pub use diff::{diff, diff_entries, SnapshotDiff};
