//! Key-level comparison of two snapshots.

use crate::types::{Entry, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keys that differ between a reference side (A) and another side (B).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Keys present in A but not in B.
    pub added: Vec<String>,

    /// Keys present in B but not in A.
    pub removed: Vec<String>,

    /// Keys present in both whose values differ.
    pub modified: Vec<String>,
}

impl SnapshotDiff {
    /// True when both sides hold the same key/value pairs.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Compare snapshot `a` (the reference side) against snapshot `b`.
///
/// Always walks the data: a caller-built or edited `Snapshot` may carry a
/// digest that no longer matches its entries.
pub fn diff(a: &Snapshot, b: &Snapshot) -> SnapshotDiff {
    diff_entries(&a.data, &b.data)
}

/// Compare two snapshots held by a `SnapshotArchive`.
///
/// Archived digests are computed on push and the data is never mutated
/// afterwards, so equal digests skip the per-key walk.
pub(crate) fn diff_archived(a: &Snapshot, b: &Snapshot) -> SnapshotDiff {
    if a.digest == b.digest {
        return SnapshotDiff::default();
    }
    diff_entries(&a.data, &b.data)
}

/// Compare two state mappings. Only values are compared, timestamps are
/// ignored. Each key list is sorted.
pub fn diff_entries(a: &HashMap<String, Entry>, b: &HashMap<String, Entry>) -> SnapshotDiff {
    let mut result = SnapshotDiff::default();

    for (key, entry) in a {
        match b.get(key) {
            None => result.added.push(key.clone()),
            Some(other) if other.value != entry.value => result.modified.push(key.clone()),
            Some(_) => {}
        }
    }

    for key in b.keys() {
        if !a.contains_key(key) {
            result.removed.push(key.clone());
        }
    }

    result.added.sort();
    result.removed.sort();
    result.modified.sort();
    result
}
